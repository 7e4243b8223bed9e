//! `url` built-in (spec §4.3): the WHATWG `URL`/`URLSearchParams` pair
//! backed by the `url` crate, plus the legacy `url.parse`/`url.format`
//! functions some CommonJS packages still import directly.

use rsquickjs::prelude::{Func, Opt};
use rsquickjs::{Class, Ctx, Exception, Object, Result};
use url::Url;

#[rsquickjs::class]
#[derive(Clone, rsquickjs::class::Trace, rsquickjs::JsLifetime)]
pub struct URLSearchParams {
    #[qjs(skip_trace)]
    pairs: Vec<(String, String)>,
}

#[rsquickjs::methods]
impl<'js> URLSearchParams {
    #[qjs(constructor)]
    pub fn new(init: Opt<String>) -> Self {
        let pairs = init
            .0
            .map(|s| {
                url::form_urlencoded::parse(s.trim_start_matches('?').as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default();
        Self { pairs }
    }

    pub fn get(&self, name: String) -> Option<String> {
        self.pairs.iter().find(|(k, _)| *k == name).map(|(_, v)| v.clone())
    }

    #[qjs(rename = "getAll")]
    pub fn get_all(&self, name: String) -> Vec<String> {
        self.pairs.iter().filter(|(k, _)| *k == name).map(|(_, v)| v.clone()).collect()
    }

    pub fn has(&self, name: String) -> bool {
        self.pairs.iter().any(|(k, _)| *k == name)
    }

    pub fn set(&mut self, name: String, value: String) {
        self.pairs.retain(|(k, _)| *k != name);
        self.pairs.push((name, value));
    }

    pub fn append(&mut self, name: String, value: String) {
        self.pairs.push((name, value));
    }

    #[qjs(rename = "delete")]
    pub fn delete(&mut self, name: String) {
        self.pairs.retain(|(k, _)| *k != name);
    }

    pub fn keys(&self) -> Vec<String> {
        self.pairs.iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn values(&self) -> Vec<String> {
        self.pairs.iter().map(|(_, v)| v.clone()).collect()
    }

    #[qjs(rename = "toString")]
    pub fn to_string_js(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.pairs.iter())
            .finish()
    }
}

#[rsquickjs::class]
#[derive(Clone, rsquickjs::class::Trace, rsquickjs::JsLifetime)]
pub struct URL {
    #[qjs(skip_trace)]
    inner: Url,
}

#[rsquickjs::methods]
impl<'js> URL {
    #[qjs(constructor)]
    pub fn new(ctx: Ctx<'js>, input: String, base: Opt<String>) -> Result<Self> {
        let inner = match base.0 {
            Some(base) => {
                let base = Url::parse(&base).map_err(|e| Exception::throw_type(&ctx, &e.to_string()))?;
                base.join(&input).map_err(|e| Exception::throw_type(&ctx, &e.to_string()))?
            }
            None => Url::parse(&input).map_err(|e| Exception::throw_type(&ctx, &e.to_string()))?,
        };
        Ok(Self { inner })
    }

    #[qjs(get, rename = "href")]
    pub fn href(&self) -> String {
        self.inner.to_string()
    }
    #[qjs(get, rename = "protocol")]
    pub fn protocol(&self) -> String {
        format!("{}:", self.inner.scheme())
    }
    #[qjs(get, rename = "host")]
    pub fn host(&self) -> String {
        self.inner.host_str().map(|h| match self.inner.port() {
            Some(p) => format!("{h}:{p}"),
            None => h.to_string(),
        }).unwrap_or_default()
    }
    #[qjs(get, rename = "hostname")]
    pub fn hostname(&self) -> String {
        self.inner.host_str().unwrap_or_default().to_string()
    }
    #[qjs(get, rename = "port")]
    pub fn port(&self) -> String {
        self.inner.port().map(|p| p.to_string()).unwrap_or_default()
    }
    #[qjs(get, rename = "pathname")]
    pub fn pathname(&self) -> String {
        self.inner.path().to_string()
    }
    #[qjs(get, rename = "search")]
    pub fn search(&self) -> String {
        self.inner.query().map(|q| format!("?{q}")).unwrap_or_default()
    }
    #[qjs(get, rename = "hash")]
    pub fn hash(&self) -> String {
        self.inner.fragment().map(|f| format!("#{f}")).unwrap_or_default()
    }
    #[qjs(get, rename = "origin")]
    pub fn origin(&self) -> String {
        self.inner.origin().ascii_serialization()
    }
    #[qjs(get, rename = "searchParams")]
    pub fn search_params(&self) -> URLSearchParams {
        URLSearchParams {
            pairs: self.inner.query_pairs().into_owned().collect(),
        }
    }

    #[qjs(rename = "toString")]
    pub fn to_string_js(&self) -> String {
        self.inner.to_string()
    }
    #[qjs(rename = "toJSON")]
    pub fn to_json(&self) -> String {
        self.inner.to_string()
    }
}

/// Build the `url` namespace: the `URL`/`URLSearchParams` classes plus the
/// legacy `parse`/`format` functions.
pub fn install<'js>(ctx: &Ctx<'js>) -> Result<Object<'js>> {
    let ns = Object::new(ctx.clone())?;

    let url_ctor = Class::<URL>::create_constructor(ctx)?
        .ok_or_else(|| Exception::throw_message(ctx, "failed to build URL constructor"))?;
    ns.set("URL", url_ctor)?;

    let params_ctor = Class::<URLSearchParams>::create_constructor(ctx)?
        .ok_or_else(|| Exception::throw_message(ctx, "failed to build URLSearchParams constructor"))?;
    ns.set("URLSearchParams", params_ctor)?;

    ns.set(
        "parse",
        Func::from(|ctx: Ctx<'js>, input: String| -> Result<Object<'js>> {
            let parsed = Url::parse(&input).map_err(|e| Exception::throw_type(&ctx, &e.to_string()))?;
            let obj = Object::new(ctx)?;
            obj.set("protocol", format!("{}:", parsed.scheme()))?;
            obj.set("host", parsed.host_str().unwrap_or_default())?;
            obj.set("hostname", parsed.host_str().unwrap_or_default())?;
            obj.set("port", parsed.port().map(|p| p.to_string()).unwrap_or_default())?;
            obj.set("pathname", parsed.path())?;
            obj.set("search", parsed.query().map(|q| format!("?{q}")).unwrap_or_default())?;
            obj.set("hash", parsed.fragment().map(|f| format!("#{f}")).unwrap_or_default())?;
            obj.set("href", parsed.to_string())?;
            Ok(obj)
        }),
    )?;
    ns.set(
        "format",
        Func::from(|ctx: Ctx<'js>, obj: Object<'js>| -> Result<String> {
            let href: Option<String> = obj.get("href").ok();
            href.ok_or_else(|| Exception::throw_type(&ctx, "url.format expects an object with an href"))
        }),
    )?;

    Ok(ns)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_params_round_trip() {
        let params = URLSearchParams::new(Opt(Some("a=1&b=2&a=3".to_string())));
        assert_eq!(params.get("a".to_string()), Some("1".to_string()));
        assert_eq!(params.get_all("a".to_string()), vec!["1".to_string(), "3".to_string()]);
        assert!(params.has("b".to_string()));
    }
}
