//! Handlebars-backed expression evaluator for `with`/`outputs`/transition fields (§4.1).
//!
//! Wraps a single `handlebars::Handlebars` instance, configured in strict mode
//! so a missing variable path fails the render instead of producing empty
//! output, and registers the same small helper set the teacher's own
//! `ai::templates::engine` exposed for its prompt templates.

use super::error::{CompozyError, Result};
use handlebars::{Context, Handlebars, Helper, HelperResult, Output, RenderContext, RenderErrorReason};
use serde_json::Value;

/// Recursively evaluates `{{ ... }}` fragments against `ctx`.
///
/// Strings are rendered through handlebars; arrays and objects are descended
/// depth-first, insertion order preserved; every other scalar passes through
/// unchanged. Object key order in the output is whatever `serde_json::Map`
/// produces on serialization (insertion order, not re-sorted here).
pub struct TemplateEngine {
    handlebars: Handlebars<'static>,
}

impl TemplateEngine {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);
        register_helpers(&mut handlebars);
        Self { handlebars }
    }

    /// `ParseAny` (§4.1): recursive descent over `value`, evaluating every string leaf.
    pub fn parse_any(&self, value: &Value, ctx: &Value) -> Result<Value> {
        match value {
            Value::String(s) => Ok(self.render_string(s, ctx)?),
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.parse_any(item, ctx)?);
                }
                Ok(Value::Array(out))
            }
            Value::Object(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                for (k, v) in map {
                    out.insert(k.clone(), self.parse_any(v, ctx)?);
                }
                Ok(Value::Object(out))
            }
            other => Ok(other.clone()),
        }
    }

    /// `ParseMapWithFilter` (§4.1): top-level keys for which `skip` is `true`
    /// are copied verbatim (for later re-evaluation); the rest recurse through `parse_any`.
    pub fn parse_map_with_filter(
        &self,
        map: &serde_json::Map<String, Value>,
        ctx: &Value,
        skip: impl Fn(&str) -> bool,
    ) -> Result<serde_json::Map<String, Value>> {
        let mut out = serde_json::Map::with_capacity(map.len());
        for (k, v) in map {
            if skip(k) {
                out.insert(k.clone(), v.clone());
            } else {
                out.insert(k.clone(), self.parse_any(v, ctx)?);
            }
        }
        Ok(out)
    }

    /// `ParseStringOnly` (§4.1): evaluates `s` and requires the result to be a string.
    pub fn parse_string_only(&self, s: &str, ctx: &Value) -> Result<String> {
        let rendered = self.render_string(s, ctx)?;
        match rendered {
            Value::String(out) => Ok(out),
            other => Err(CompozyError::template(
                s.to_string(),
                format!("expected string result, got {other}"),
            )),
        }
    }

    /// Renders a single string. Strings with no `{{` are returned as-is (avoids
    /// re-parsing plain text through handlebars on every call). Strings that
    /// render to a bare JSON scalar/array/object (a single expression and
    /// nothing else) are parsed back into `Value` so `{{ .with.count }}` can
    /// yield a number, not the string `"3"`.
    fn render_string(&self, s: &str, ctx: &Value) -> Result<Value> {
        if !s.contains("{{") {
            return Ok(Value::String(s.to_string()));
        }
        if let Some(path) = bare_expression_path(s) {
            return resolve_path(ctx, path).cloned().ok_or_else(|| {
                CompozyError::template(s.to_string(), format!("variable not found: {path}"))
            });
        }
        let rendered = self.handlebars.render_template(s, ctx)?;
        Ok(Value::String(rendered))
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// If `s` is exactly one `{{ path }}` expression with no surrounding text and
/// no helper call, returns the bare dotted path so the caller can resolve it
/// directly against the JSON context and preserve its native type.
fn bare_expression_path(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    let inner = trimmed.strip_prefix("{{")?.strip_suffix("}}")?;
    if inner.contains("{{") || inner.starts_with('#') || inner.starts_with('/') || inner.starts_with('>') {
        return None;
    }
    let path = inner.trim();
    if path.is_empty() || path.contains(char::is_whitespace) {
        return None;
    }
    Some(path)
}

/// Resolves a dotted/bracketed path (`a.b.c`, `items.0`, `items.[0]`) against a
/// JSON value. Returns `None` on any missing segment.
fn resolve_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for raw_segment in path.split('.') {
        let segment = raw_segment.trim_start_matches('[').trim_end_matches(']');
        current = if let Ok(index) = segment.parse::<usize>() {
            current.as_array()?.get(index)?
        } else {
            current.as_object()?.get(segment)?
        };
    }
    Some(current)
}

fn register_helpers(handlebars: &mut Handlebars) {
    handlebars.register_helper("json", Box::new(json_helper));
    handlebars.register_helper("uppercase", Box::new(uppercase_helper));
    handlebars.register_helper("lowercase", Box::new(lowercase_helper));
    handlebars.register_helper("capitalize", Box::new(capitalize_helper));
    handlebars.register_helper("eq", Box::new(eq_helper));
    handlebars.register_helper("ne", Box::new(ne_helper));
    handlebars.register_helper("gt", Box::new(gt_helper));
    handlebars.register_helper("lt", Box::new(lt_helper));
    handlebars.register_helper("len", Box::new(len_helper));
    handlebars.register_helper("format_date", Box::new(format_date_helper));
}

fn json_helper(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    let param = h.param(0).ok_or_else(|| RenderErrorReason::ParamNotFoundForIndex("json", 0))?;
    let json_str = serde_json::to_string(param.value()).map_err(|e| RenderErrorReason::NestedError(Box::new(e)))?;
    out.write(&json_str)?;
    Ok(())
}

fn uppercase_helper(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    let param = h.param(0).ok_or_else(|| RenderErrorReason::ParamNotFoundForIndex("uppercase", 0))?;
    if let Some(s) = param.value().as_str() {
        out.write(&s.to_uppercase())?;
    }
    Ok(())
}

fn lowercase_helper(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    let param = h.param(0).ok_or_else(|| RenderErrorReason::ParamNotFoundForIndex("lowercase", 0))?;
    if let Some(s) = param.value().as_str() {
        out.write(&s.to_lowercase())?;
    }
    Ok(())
}

fn capitalize_helper(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    let param = h.param(0).ok_or_else(|| RenderErrorReason::ParamNotFoundForIndex("capitalize", 0))?;
    if let Some(s) = param.value().as_str() {
        let mut chars = s.chars();
        if let Some(first) = chars.next() {
            out.write(&first.to_uppercase().to_string())?;
            out.write(chars.as_str())?;
        }
    }
    Ok(())
}

fn eq_helper(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    let p1 = h.param(0).ok_or_else(|| RenderErrorReason::ParamNotFoundForIndex("eq", 0))?;
    let p2 = h.param(1).ok_or_else(|| RenderErrorReason::ParamNotFoundForIndex("eq", 1))?;
    out.write(&(p1.value() == p2.value()).to_string())?;
    Ok(())
}

fn ne_helper(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    let p1 = h.param(0).ok_or_else(|| RenderErrorReason::ParamNotFoundForIndex("ne", 0))?;
    let p2 = h.param(1).ok_or_else(|| RenderErrorReason::ParamNotFoundForIndex("ne", 1))?;
    out.write(&(p1.value() != p2.value()).to_string())?;
    Ok(())
}

fn gt_helper(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    let p1 = h.param(0).ok_or_else(|| RenderErrorReason::ParamNotFoundForIndex("gt", 0))?;
    let p2 = h.param(1).ok_or_else(|| RenderErrorReason::ParamNotFoundForIndex("gt", 1))?;
    let result = matches!((p1.value().as_f64(), p2.value().as_f64()), (Some(a), Some(b)) if a > b);
    out.write(&result.to_string())?;
    Ok(())
}

fn lt_helper(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    let p1 = h.param(0).ok_or_else(|| RenderErrorReason::ParamNotFoundForIndex("lt", 0))?;
    let p2 = h.param(1).ok_or_else(|| RenderErrorReason::ParamNotFoundForIndex("lt", 1))?;
    let result = matches!((p1.value().as_f64(), p2.value().as_f64()), (Some(a), Some(b)) if a < b);
    out.write(&result.to_string())?;
    Ok(())
}

fn len_helper(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    let param = h.param(0).ok_or_else(|| RenderErrorReason::ParamNotFoundForIndex("len", 0))?;
    let length = if let Some(arr) = param.value().as_array() {
        arr.len()
    } else if let Some(obj) = param.value().as_object() {
        obj.len()
    } else if let Some(s) = param.value().as_str() {
        s.len()
    } else {
        0
    };
    out.write(&length.to_string())?;
    Ok(())
}

fn format_date_helper(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    let param = h.param(0).ok_or_else(|| RenderErrorReason::ParamNotFoundForIndex("format_date", 0))?;
    let format = h.param(1).and_then(|p| p.value().as_str()).unwrap_or("%Y-%m-%d %H:%M:%S");
    if let Some(date_str) = param.value().as_str() {
        if let Ok(date) = chrono::DateTime::parse_from_rfc3339(date_str) {
            out.write(&date.format(format).to_string())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_any_interpolates_nested_strings() {
        let engine = TemplateEngine::new();
        let ctx = json!({"name": "Ada", "items": ["x", "y"]});
        let value = json!({"greeting": "Hello {{name}}", "items": ["{{items.[0]}}", "plain"]});
        let result = engine.parse_any(&value, &ctx).unwrap();
        assert_eq!(result["greeting"], json!("Hello Ada"));
        assert_eq!(result["items"][0], json!("x"));
        assert_eq!(result["items"][1], json!("plain"));
    }

    #[test]
    fn parse_any_fails_on_missing_variable() {
        let engine = TemplateEngine::new();
        let ctx = json!({});
        let result = engine.parse_any(&json!("{{missing}}"), &ctx);
        assert!(result.is_err());
    }

    #[test]
    fn parse_string_only_rejects_non_string_result() {
        let engine = TemplateEngine::new();
        let ctx = json!({"count": 3});
        assert!(engine.parse_string_only("{{count}}", &ctx).is_err());
        assert_eq!(engine.parse_string_only("n={{count}}", &ctx).unwrap(), "n=3");
    }

    #[test]
    fn single_expression_preserves_non_string_type() {
        let engine = TemplateEngine::new();
        let ctx = json!({"count": 3, "flag": true});
        assert_eq!(engine.parse_any(&json!("{{count}}"), &ctx).unwrap(), json!(3));
        assert_eq!(engine.parse_any(&json!("{{flag}}"), &ctx).unwrap(), json!(true));
    }

    #[test]
    fn parse_map_with_filter_preserves_skipped_keys_verbatim() {
        let engine = TemplateEngine::new();
        let ctx = json!({"name": "Ada"});
        let mut map = serde_json::Map::new();
        map.insert("prompt".to_string(), json!("reparse later {{name}}"));
        map.insert("greeting".to_string(), json!("Hello {{name}}"));
        let result = engine
            .parse_map_with_filter(&map, &ctx, |k| k == "prompt")
            .unwrap();
        assert_eq!(result["prompt"], json!("reparse later {{name}}"));
        assert_eq!(result["greeting"], json!("Hello Ada"));
    }

    #[test]
    fn non_template_scalars_pass_through() {
        let engine = TemplateEngine::new();
        let ctx = json!({});
        assert_eq!(engine.parse_any(&json!(42), &ctx).unwrap(), json!(42));
        assert_eq!(engine.parse_any(&json!(null), &ctx).unwrap(), json!(null));
    }
}
