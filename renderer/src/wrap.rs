//! Builds the framework-specific async IIFE submitted to the Sandbox Host
//! (spec §4.8 step 4): inline `props`/`slots` as JSON, run the user code in
//! the same function scope as the component lookup (so top-level `var`s
//! and `function` declarations the user code introduces are visible to the
//! well-known-name fallback chain), invoke the framework's render
//! primitive, and return a JSON-stringified `{html, css, head}` — or
//! `{__error}` on a thrown exception, which the caller turns into an
//! inline error snippet rather than failing the whole eval.

use crate::framework::Framework;

const COMPONENT_LOOKUP: &str = r#"
    var component = exports.default || exports.component || exports.App
      || (typeof $$Component !== 'undefined' ? $$Component : undefined)
      || (typeof App !== 'undefined' ? App : undefined)
      || (typeof default_1 !== 'undefined' ? default_1 : undefined)
      || (typeof component !== 'undefined' ? component : undefined);
    if (!component) throw new Error('__COMPONENT_NOT_FOUND__');
"#;

fn render_call(framework: Framework) -> &'static str {
    match framework {
        Framework::Astro => {
            r#"
    var __result = globalThis.$$createAstroResult();
    var __html = typeof component === 'function'
      ? globalThis.$$stringifyChunk(component(__result, props, slots))
      : globalThis.$$stringifyChunk(component);
    return JSON.stringify({ html: __html, css: '', head: '' });
"#
        }
        Framework::Vue => {
            r#"
    var __html = globalThis.renderToString(component, { props: props, slots: slots });
    return JSON.stringify({ html: __html, css: '', head: '' });
"#
        }
        Framework::Svelte => {
            r#"
    var __out = globalThis.svelteRender(component, props);
    return JSON.stringify({ html: __out.html, css: (__out.css && __out.css.code) || '', head: __out.head || '' });
"#
        }
        Framework::React => {
            r#"
    var __vnode = typeof component === 'function' ? globalThis.createElement(component, props) : component;
    var __html = globalThis.renderVNode(__vnode);
    return JSON.stringify({ html: __html, css: '', head: '' });
"#
        }
    }
}

pub fn build(framework: Framework, code: &str, props_json: &str, slots_json: &str) -> String {
    format!(
        r#"(async function() {{
  try {{
    var module = {{ exports: {{}} }};
    var exports = module.exports;
{code}
    var props = {props_json};
    var slots = {slots_json};
{lookup}
{render_call}
  }} catch (e) {{
    return JSON.stringify({{ __error: String((e && e.message) || e) }});
  }}
}})()"#,
        code = code,
        props_json = props_json,
        slots_json = slots_json,
        lookup = COMPONENT_LOOKUP,
        render_call = render_call(framework),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_code_and_embeds_props() {
        let wrapped = build(Framework::React, "function App(){}", "{\"a\":1}", "{}");
        assert!(wrapped.contains("function App(){}"));
        assert!(wrapped.contains("{\"a\":1}"));
        assert!(wrapped.contains("__COMPONENT_NOT_FOUND__"));
    }
}
