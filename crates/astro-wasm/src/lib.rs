//! WASM bindings for the Astro template parser and prop serializer.
//!
//! Exposes `parse()`, `serializeProps()` and `version()` to JavaScript via
//! wasm-bindgen. Errors are thrown as JS errors.

use std::sync::Arc;

use astro_parser::{Ast, CompileOptions, Compiler, ParseError};
use astro_runtime::props::serialize_props;
use astro_runtime::{PropValue, Props};
use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

/// Parse `.astro` source into its AST.
///
/// `options` is an optional `{ injectDoctype, hmrScript }` object. Returns a
/// plain JS object mirroring the Rust AST; throws on a compile error.
#[wasm_bindgen]
pub fn parse(source: &str, options: JsValue) -> Result<JsValue, JsError> {
    let options = if options.is_undefined() || options.is_null() {
        CompileOptions::default()
    } else {
        serde_wasm_bindgen::from_value(options).map_err(|e| JsError::new(&e.to_string()))?
    };
    let ast = compile(source, options).map_err(|e| JsError::new(&e.to_string()))?;
    ast.serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| JsError::new(&e.to_string()))
}

/// Serialize a props object into the wire format read by `<astro-island>`.
#[wasm_bindgen(js_name = serializeProps)]
pub fn serialize_props_js(props: JsValue, display_name: Option<String>) -> Result<String, JsError> {
    let name = display_name.as_deref().unwrap_or("component");
    let Some(object) = props.dyn_ref::<js_sys::Object>() else {
        return Err(JsError::new("props must be an object"));
    };
    let mut parents = vec![props.clone()];
    let props = object_to_props(object, &mut parents, name)?;
    Ok(serialize_props(&props))
}

/// Get the compiler version.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn compile(source: &str, options: CompileOptions) -> Result<Arc<Ast>, ParseError> {
    Compiler::new(options).compile("<input>", source)
}

fn object_to_props(
    object: &js_sys::Object,
    parents: &mut Vec<JsValue>,
    name: &str,
) -> Result<Props, JsError> {
    let mut props = Props::new();
    for entry in js_sys::Object::entries(object).iter() {
        let entry: js_sys::Array = entry.unchecked_into();
        let key = entry.get(0).as_string().unwrap_or_default();
        props.insert(key, to_prop_value(&entry.get(1), parents, name)?);
    }
    Ok(props)
}

fn to_prop_value(value: &JsValue, parents: &mut Vec<JsValue>, name: &str) -> Result<PropValue, JsError> {
    if value.is_undefined() || value.is_function() || value.is_symbol() {
        return Ok(PropValue::Undefined);
    }
    if value.is_null() {
        return Ok(PropValue::Null);
    }
    if let Some(b) = value.as_bool() {
        return Ok(PropValue::Bool(b));
    }
    if let Some(n) = value.as_f64() {
        return Ok(PropValue::Number(n));
    }
    if let Some(s) = value.as_string() {
        return Ok(PropValue::String(s));
    }
    if value.is_bigint() {
        let text = String::from(value.unchecked_ref::<js_sys::BigInt>().to_string(10).map_err(
            |_| JsError::new("bigint is not representable"),
        )?);
        let n = text
            .parse::<i128>()
            .map_err(|_| JsError::new(&format!("bigint {text} does not fit in 128 bits")))?;
        return Ok(PropValue::BigInt(n));
    }
    if let Some(date) = value.dyn_ref::<js_sys::Date>() {
        let millis = date_millis(date.get_time()).ok_or_else(|| {
            JsError::new(&format!("Invalid Date in props of <{name}> cannot be serialized"))
        })?;
        return Ok(PropValue::Date(millis));
    }
    if let Some(re) = value.dyn_ref::<js_sys::RegExp>() {
        return Ok(PropValue::RegExp {
            source: re.source().into(),
            flags: re.flags().into(),
        });
    }
    if let Some(bytes) = value.dyn_ref::<js_sys::Uint8Array>() {
        return Ok(PropValue::Uint8Array(bytes.to_vec()));
    }
    if let Some(words) = value.dyn_ref::<js_sys::Uint16Array>() {
        return Ok(PropValue::Uint16Array(words.to_vec()));
    }
    if let Some(words) = value.dyn_ref::<js_sys::Uint32Array>() {
        return Ok(PropValue::Uint32Array(words.to_vec()));
    }

    if parents.contains(value) {
        return Err(JsError::new(&format!(
            "Cyclic reference detected while serializing props for <{name}>"
        )));
    }
    parents.push(value.clone());
    let converted = to_container_value(value, parents, name);
    parents.pop();
    converted
}

/// Milliseconds since the epoch; an Invalid Date has no wire form.
fn date_millis(time: f64) -> Option<i64> {
    (!time.is_nan()).then_some(time as i64)
}

fn to_container_value(
    value: &JsValue,
    parents: &mut Vec<JsValue>,
    name: &str,
) -> Result<PropValue, JsError> {
    if let Some(map) = value.dyn_ref::<js_sys::Map>() {
        let mut entries = Vec::new();
        for entry in js_sys::Array::from(&map.entries()).iter() {
            let entry: js_sys::Array = entry.unchecked_into();
            entries.push((
                to_prop_value(&entry.get(0), parents, name)?,
                to_prop_value(&entry.get(1), parents, name)?,
            ));
        }
        return Ok(PropValue::Map(entries));
    }
    if let Some(set) = value.dyn_ref::<js_sys::Set>() {
        let mut items = Vec::new();
        for item in js_sys::Array::from(&set.values()).iter() {
            items.push(to_prop_value(&item, parents, name)?);
        }
        return Ok(PropValue::Set(items));
    }
    if let Some(array) = value.dyn_ref::<js_sys::Array>() {
        let mut items = Vec::new();
        for item in array.iter() {
            items.push(to_prop_value(&item, parents, name)?);
        }
        return Ok(PropValue::Array(items));
    }
    let Some(object) = value.dyn_ref::<js_sys::Object>() else {
        return Ok(PropValue::Undefined);
    };
    if String::from(object.constructor().name()) == "URL" {
        let href = js_sys::Reflect::get(object, &"href".into())
            .ok()
            .and_then(|v| v.as_string())
            .unwrap_or_default();
        return Ok(PropValue::Url(href));
    }
    Ok(PropValue::Object(object_to_props(object, parents, name)?))
}
