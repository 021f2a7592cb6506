//! Line-delimited JSON spoken between the engine and a sandbox worker.
//!
//! Each request is one line on the worker's stdin; the worker answers with
//! exactly one line on its stdout. `output` carries whatever the submission
//! printed since the previous response.

use agrolab_common::types::{RequiredSymbol, SymbolKind};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::RaisedError;
use crate::value::PyValue;

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request<'a> {
    Load {
        source: &'a str,
        required: Vec<WireSymbol<'a>>,
    },
    Call {
        target: &'a str,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
    },
    CallMethod {
        obj: Value,
        name: &'a str,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
    },
    GetAttr {
        obj: Value,
        name: &'a str,
    },
    SetAttr {
        obj: Value,
        name: &'a str,
        value: Value,
    },
    Str {
        obj: Value,
    },
    IsInstance {
        obj: Value,
        class: &'a str,
    },
}

#[derive(Debug, Serialize)]
pub struct WireSymbol<'a> {
    pub name: &'a str,
    pub kind: SymbolKind,
}

impl<'a> From<&'a RequiredSymbol> for WireSymbol<'a> {
    fn from(symbol: &'a RequiredSymbol) -> Self {
        WireSymbol {
            name: &symbol.name,
            kind: symbol.kind,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub error: Option<WireError>,
    #[serde(default)]
    pub output: String,
}

/// Where in the load sequence a failure happened
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Compile,
    Exec,
    Symbols,
    Call,
    Protocol,
}

#[derive(Debug, Deserialize)]
pub struct WireError {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub mro: Vec<String>,
    #[serde(default)]
    pub phase: Option<Phase>,
    #[serde(default)]
    pub line: Option<u32>,
    #[serde(default, rename = "ref")]
    pub handle: Option<u64>,
}

impl WireError {
    pub fn into_raised(self) -> RaisedError {
        let exception = self.handle.map(|id| PyValue::Object {
            id,
            type_name: self.kind.clone(),
        });
        RaisedError {
            kind: self.kind,
            message: self.message,
            mro: self.mro,
            line: self.line,
            exception,
        }
    }
}

pub fn encode_args(args: &[PyValue]) -> Vec<Value> {
    args.iter().map(PyValue::to_wire).collect()
}

pub fn encode_kwargs(kwargs: &[(&str, PyValue)]) -> Map<String, Value> {
    kwargs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_wire()))
        .collect()
}

/// Serialize a request into a single newline-terminated line
pub fn frame(request: &Request<'_>) -> Vec<u8> {
    // Serializing these plain structs cannot fail
    let mut line = serde_json::to_vec(request).unwrap_or_default();
    line.push(b'\n');
    line
}
