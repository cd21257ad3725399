use std::collections::BTreeMap;

use hs_core::{HostScriptError, HostValue};
use rhai::{Array, Dynamic, ImmutableString, Map, FLOAT, INT};

use crate::host_object::EventObject;

pub fn host_value_to_dynamic(value: &HostValue) -> Dynamic {
    match value {
        HostValue::Null => Dynamic::UNIT,
        HostValue::Bool(value) => Dynamic::from_bool(*value),
        HostValue::Number(value) => {
            if value.fract() == 0.0 && value.abs() < (INT::MAX as f64) {
                Dynamic::from_int(*value as INT)
            } else {
                Dynamic::from_float(*value as FLOAT)
            }
        }
        HostValue::String(value) => Dynamic::from(value.clone()),
        HostValue::Array(values) => {
            Dynamic::from_array(values.iter().map(host_value_to_dynamic).collect::<Array>())
        }
        HostValue::Map(values) => {
            let mut map = Map::new();
            for (key, value) in values {
                map.insert(key.clone().into(), host_value_to_dynamic(value));
            }
            Dynamic::from_map(map)
        }
    }
}

pub fn dynamic_to_host_value(value: Dynamic) -> Result<HostValue, HostScriptError> {
    let value = value.flatten();
    if value.is_unit() {
        return Ok(HostValue::Null);
    }
    if value.is::<bool>() {
        return Ok(HostValue::Bool(value.cast::<bool>()));
    }
    if value.is::<INT>() {
        return Ok(HostValue::Number(value.cast::<INT>() as f64));
    }
    if value.is::<FLOAT>() {
        return Ok(HostValue::Number(value.cast::<FLOAT>()));
    }
    if value.is::<ImmutableString>() {
        return Ok(HostValue::String(value.cast::<ImmutableString>().to_string()));
    }
    if value.is::<char>() {
        return Ok(HostValue::String(value.cast::<char>().to_string()));
    }
    if value.is::<Array>() {
        let array = value.cast::<Array>();
        let mut out = Vec::with_capacity(array.len());
        for item in array {
            out.push(dynamic_to_host_value(item)?);
        }
        return Ok(HostValue::Array(out));
    }
    if value.is::<Map>() {
        let map = value.cast::<Map>();
        let mut out = BTreeMap::new();
        for (key, value) in map {
            out.insert(key.to_string(), dynamic_to_host_value(value)?);
        }
        return Ok(HostValue::Map(out));
    }
    if value.is::<EventObject>() {
        let object = value.cast::<EventObject>();
        return Ok(HostValue::Map(BTreeMap::from([
            ("objectId".to_string(), HostValue::Number(object.id().0 as f64)),
            ("kind".to_string(), HostValue::String(object.kind().to_string())),
        ])));
    }

    Err(HostScriptError::new(
        "RUN_VALUE_UNSUPPORTED",
        format!("Cannot pass a {} value back to the host.", value.type_name()),
    ))
}
