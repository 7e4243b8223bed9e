//! Per-framework JS runtime shims (spec §4.8 "Runtime shims"). Each shim is
//! evaluated once per [`crate::Renderer`] into the shared Sandbox Host
//! context; the bodies are idempotent (guarded by `typeof` checks) so a
//! second evaluation — e.g. after [`xmas_sandbox::SandboxHost::destroy`]
//! and re-`init` — never double-declares anything.

/// Shared helpers every framework shim depends on: HTML escaping and
/// attribute rendering (spec §4.8 "Shared base").
pub const BASE_SHIM: &str = r#"
if (typeof globalThis.$$escapeHTML === 'undefined') {
  globalThis.$$escapeHTML = function(value) {
    if (value === null || value === undefined) return '';
    return String(value)
      .replace(/&/g, '&amp;')
      .replace(/</g, '&lt;')
      .replace(/>/g, '&gt;')
      .replace(/"/g, '&quot;')
      .replace(/'/g, '&#39;');
  };
  globalThis.$$renderAttrs = function(attrs) {
    if (!attrs) return '';
    var out = '';
    for (var key in attrs) {
      var value = attrs[key];
      if (value === null || value === undefined || value === false) continue;
      if (value === true) {
        out += ' ' + key;
      } else {
        out += ' ' + key + '="' + globalThis.$$escapeHTML(value) + '"';
      }
    }
    return out;
  };
  globalThis.$$VOID_ELEMENTS = {
    area: true, base: true, br: true, col: true, embed: true, hr: true,
    img: true, input: true, link: true, meta: true, param: true,
    source: true, track: true, wbr: true,
  };
}
"#;

pub const ASTRO_SHIM: &str = r#"
if (typeof globalThis.$$renderComponent === 'undefined') {
  globalThis.Astro = {
    createAstro: function(site, props, slots) {
      return { site: site || null, props: props || {}, slots: slots || {}, request: {} };
    },
  };
  globalThis.$$addAttribute = function(value, name) {
    var obj = {};
    obj[name] = value;
    return obj;
  };
  globalThis.$$spreadAttributes = function(attrs) {
    return globalThis.$$renderAttrs(attrs);
  };
  globalThis.$$maybeRenderHead = function() { return ''; };
  globalThis.$$renderHead = function() { return ''; };
  globalThis.$$render = function(strings, ...values) {
    var out = strings[0];
    for (var i = 0; i < values.length; i++) {
      out += globalThis.$$stringifyChunk(values[i]);
      out += strings[i + 1];
    }
    return out;
  };
  globalThis.$$stringifyChunk = function(value) {
    if (value === null || value === undefined) return '';
    if (value && typeof value.then === 'function') return '';
    if (Array.isArray(value)) return value.map(globalThis.$$stringifyChunk).join('');
    return String(value);
  };
  globalThis.$$renderComponent = function(result, name, Component, props, slots) {
    slots = slots || {};
    if (typeof Component === 'function') {
      var rendered = Component(props || {}, slots);
      return globalThis.$$stringifyChunk(rendered);
    }
    return '<' + name + globalThis.$$renderAttrs(props) + '></' + name + '>';
  };
  globalThis.$$createAstroResult = function() {
    return { styles: new Set(), scripts: new Set(), html: '' };
  };
}
"#;

pub const VUE_SHIM: &str = r#"
if (typeof globalThis.h === 'undefined') {
  globalThis.h = function(tag, props, children) {
    return { tag: tag, props: props || {}, children: children || [] };
  };
  globalThis.reactive = function(obj) { return obj; };
  globalThis.ref = function(value) { return { value: value }; };
  globalThis.computed = function(getter) { return { value: getter() }; };
  globalThis.createApp = function(component) {
    return { component: component, mount: function() {} };
  };
  globalThis.$$renderVNode = function(node) {
    if (node === null || node === undefined || node === false) return '';
    if (typeof node === 'string' || typeof node === 'number') {
      return globalThis.$$escapeHTML(node);
    }
    if (Array.isArray(node)) return node.map(globalThis.$$renderVNode).join('');
    if (typeof node.tag === 'function') {
      return globalThis.$$renderVNode(node.tag(node.props || {}));
    }
    var tag = node.tag || 'div';
    var attrs = globalThis.$$renderAttrs(node.props);
    if (globalThis.$$VOID_ELEMENTS[tag]) {
      return '<' + tag + attrs + '/>';
    }
    var inner = Array.isArray(node.children)
      ? node.children.map(globalThis.$$renderVNode).join('')
      : globalThis.$$renderVNode(node.children);
    return '<' + tag + attrs + '>' + inner + '</' + tag + '>';
  };
  globalThis.renderToString = function(componentOrApp, ctx) {
    var component = componentOrApp && componentOrApp.component ? componentOrApp.component : componentOrApp;
    var vnode = typeof component === 'function' ? component(ctx || {}) : component;
    return globalThis.$$renderVNode(vnode);
  };
}
"#;

pub const SVELTE_SHIM: &str = r#"
if (typeof globalThis.create_ssr_component === 'undefined') {
  globalThis.SvelteComponent = function() {};
  globalThis.escape = function(value) { return globalThis.$$escapeHTML(value); };
  globalThis.add_attribute = function(name, value, boolean) {
    if (boolean && !value) return '';
    return ' ' + name + '="' + globalThis.$$escapeHTML(value) + '"';
  };
  globalThis.each = function(items, fn) {
    return (items || []).map(fn).join('');
  };
  globalThis.create_ssr_component = function(renderFn) {
    return {
      render: function(props, opts) {
        var result = { head: '' };
        var html = renderFn(result, props || {}, {}, {});
        return { html: html, css: { code: '', map: null }, head: result.head };
      },
    };
  };
  globalThis.svelteRender = function(Component, props) {
    var out = Component.render(props || {});
    return { html: out.html, css: out.css || { code: '' }, head: out.head || '' };
  };
}
"#;

pub const REACT_SHIM: &str = r#"
if (typeof globalThis.createElement === 'undefined') {
  globalThis.Fragment = Symbol.for('react.fragment');
  globalThis.createElement = function(type, props) {
    var children = Array.prototype.slice.call(arguments, 2);
    props = props || {};
    if (children.length === 1) children = children[0];
    else if (children.length === 0) children = props.children;
    return { type: type, props: Object.assign({}, props, { children: children }) };
  };
  globalThis.React = { createElement: globalThis.createElement, Fragment: globalThis.Fragment };
  globalThis.$$ATTR_RENAMES = { className: 'class', htmlFor: 'for' };
  globalThis.$$renderAttrsReact = function(props) {
    var out = {};
    for (var key in props) {
      if (key === 'children') continue;
      var name = globalThis.$$ATTR_RENAMES[key] || key;
      out[name] = props[key];
    }
    return globalThis.$$renderAttrs(out);
  };
  globalThis.renderVNode = function(node) {
    if (node === null || node === undefined || node === false || node === true) return '';
    if (typeof node === 'string' || typeof node === 'number') {
      return globalThis.$$escapeHTML(node);
    }
    if (Array.isArray(node)) return node.map(globalThis.renderVNode).join('');
    if (!node || typeof node !== 'object') return '';
    if (node.type === globalThis.Fragment) {
      return globalThis.renderVNode(node.props.children);
    }
    if (typeof node.type === 'function') {
      var result = node.type(node.props);
      return globalThis.renderVNode(result);
    }
    var tag = node.type;
    var attrs = globalThis.$$renderAttrsReact(node.props);
    if (globalThis.$$VOID_ELEMENTS[tag]) {
      return '<' + tag + attrs + '/>';
    }
    return '<' + tag + attrs + '>' + globalThis.renderVNode(node.props.children) + '</' + tag + '>';
  };
}
"#;

pub fn shim_source(framework: crate::framework::Framework) -> &'static str {
    match framework {
        crate::framework::Framework::Astro => ASTRO_SHIM,
        crate::framework::Framework::Vue => VUE_SHIM,
        crate::framework::Framework::Svelte => SVELTE_SHIM,
        crate::framework::Framework::React => REACT_SHIM,
    }
}
