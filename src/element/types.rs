//! Monitor element data types
//!
//! - `Payload`: the typed content of an element, one variant per `TypeTag`
//! - `MonitorElement`: a named payload plus its lumi flag and tag id

use crate::element::histogram::Histogram;
use crate::element::kind::TypeTag;
use serde::Serialize;

/// Typed element content, one variant per element kind
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Payload {
    Int(i64),
    Float(f64),
    String(String),
    TH1F(Histogram),
    TH1S(Histogram),
    TH1D(Histogram),
    TH2F(Histogram),
    TH2S(Histogram),
    TH2D(Histogram),
    TH3F(Histogram),
    TProfile(Histogram),
    TProfile2D(Histogram),
}

impl Payload {
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Payload::Int(_) => TypeTag::Int,
            Payload::Float(_) => TypeTag::Float,
            Payload::String(_) => TypeTag::String,
            Payload::TH1F(_) => TypeTag::TH1F,
            Payload::TH1S(_) => TypeTag::TH1S,
            Payload::TH1D(_) => TypeTag::TH1D,
            Payload::TH2F(_) => TypeTag::TH2F,
            Payload::TH2S(_) => TypeTag::TH2S,
            Payload::TH2D(_) => TypeTag::TH2D,
            Payload::TH3F(_) => TypeTag::TH3F,
            Payload::TProfile(_) => TypeTag::TProfile,
            Payload::TProfile2D(_) => TypeTag::TProfile2D,
        }
    }

    pub fn histogram(&self) -> Option<&Histogram> {
        match self {
            Payload::Int(_) | Payload::Float(_) | Payload::String(_) => None,
            Payload::TH1F(h)
            | Payload::TH1S(h)
            | Payload::TH1D(h)
            | Payload::TH2F(h)
            | Payload::TH2S(h)
            | Payload::TH2D(h)
            | Payload::TH3F(h)
            | Payload::TProfile(h)
            | Payload::TProfile2D(h) => Some(h),
        }
    }

    /// Clear to the empty/zero state of the kind
    pub fn reset(&mut self) {
        match self {
            Payload::Int(v) => *v = 0,
            Payload::Float(v) => *v = 0.0,
            Payload::String(s) => s.clear(),
            Payload::TH1F(h)
            | Payload::TH1S(h)
            | Payload::TH1D(h)
            | Payload::TH2F(h)
            | Payload::TH2S(h)
            | Payload::TH2D(h)
            | Payload::TH3F(h)
            | Payload::TProfile(h)
            | Payload::TProfile2D(h) => h.reset(),
        }
    }
}

/// A named, typed monitoring element
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorElement {
    path: String,
    name: String,
    payload: Payload,
    /// Content is scoped to one lumi and reset at every new lumi
    lumi_flag: bool,
    tag: Option<u32>,
}

impl MonitorElement {
    pub fn new(path: impl Into<String>, name: impl Into<String>, payload: Payload) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            payload,
            lumi_flag: false,
            tag: None,
        }
    }

    /// Path-qualified name, `path/name` (or `name` at the root)
    pub fn full_name(&self) -> String {
        join_name(&self.path, &self.name)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TypeTag {
        self.payload.type_tag()
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut Payload {
        &mut self.payload
    }

    pub fn is_lumi(&self) -> bool {
        self.lumi_flag
    }

    pub fn set_lumi_flag(&mut self) {
        self.lumi_flag = true;
    }

    pub fn tag(&self) -> Option<u32> {
        self.tag
    }

    pub fn set_tag(&mut self, tag: u32) {
        self.tag = Some(tag);
    }

    pub fn reset(&mut self) {
        self.payload.reset();
    }

    pub fn int_value(&self) -> Option<i64> {
        match self.payload {
            Payload::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn float_value(&self) -> Option<f64> {
        match self.payload {
            Payload::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn string_value(&self) -> Option<&str> {
        match &self.payload {
            Payload::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn histogram(&self) -> Option<&Histogram> {
        self.payload.histogram()
    }
}

/// Split a full name at the last `/` into (path, leaf name)
pub fn split_name(full_name: &str) -> (&str, &str) {
    match full_name.rfind('/') {
        Some(idx) => (&full_name[..idx], &full_name[idx + 1..]),
        None => ("", full_name),
    }
}

/// Canonical form of a full name: no leading, trailing or repeated `/`
pub fn normalize_name(full_name: &str) -> String {
    full_name
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

pub(crate) fn join_name(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", path, name)
    }
}
