//! Typed record readers
//!
//! One [`RecordReader`] per element kind present in a segment. A reader owns
//! the kind's data table, decodes a row into a payload and applies it to the
//! element store: booking a new element the first time a name is seen and
//! merging into the existing one afterwards.

use crate::archive::Table;
use crate::element::{
    merge_into, normalize_name, split_name, ElementStore, Histogram, MergeError, MergeOutcome,
    Payload, TypeTag,
};
use crate::source::error::{SourceError, SourceResult};
use serde::{Deserialize, Serialize};

/// On-disk layout of a data table row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementRow<T> {
    pub full_name: String,
    /// Tag id; 0 means untagged
    pub flags: u32,
    pub value: T,
}

impl<T> ElementRow<T> {
    pub fn new(full_name: impl Into<String>, value: T) -> Self {
        Self {
            full_name: full_name.into(),
            flags: 0,
            value,
        }
    }

    pub fn tagged(mut self, tag: u32) -> Self {
        self.flags = tag;
        self
    }
}

/// A decoded data row
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRow {
    pub full_name: String,
    pub tag: u32,
    pub payload: Payload,
}

/// What applying one row did to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// A new element was booked
    Created,
    Merged,
    Ignored,
    /// The contribution was dropped; the element is unchanged
    Failed(MergeError),
}

impl From<MergeOutcome> for ApplyOutcome {
    fn from(outcome: MergeOutcome) -> Self {
        match outcome {
            MergeOutcome::Merged => ApplyOutcome::Merged,
            MergeOutcome::Ignored => ApplyOutcome::Ignored,
            MergeOutcome::Failed(e) => ApplyOutcome::Failed(e),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    pub name: String,
    pub outcome: ApplyOutcome,
}

/// Reads rows of one element kind
#[derive(Debug)]
pub struct RecordReader {
    type_tag: TypeTag,
    table: Table,
}

impl RecordReader {
    pub fn new(type_tag: TypeTag, table: Table) -> Self {
        Self { type_tag, table }
    }

    pub fn type_tag(&self) -> TypeTag {
        self.type_tag
    }

    pub fn rows(&self) -> u64 {
        self.table.len()
    }

    /// Decode data row `row` into a payload of this reader's kind
    pub fn decode(&self, row: u64) -> SourceResult<DecodedRow> {
        let decoded = match self.type_tag {
            TypeTag::Int => {
                let row: ElementRow<i64> = self.table.decode(row)?;
                DecodedRow {
                    full_name: row.full_name,
                    tag: row.flags,
                    payload: Payload::Int(row.value),
                }
            }
            TypeTag::Float => {
                let row: ElementRow<f64> = self.table.decode(row)?;
                DecodedRow {
                    full_name: row.full_name,
                    tag: row.flags,
                    payload: Payload::Float(row.value),
                }
            }
            TypeTag::String => {
                let row: ElementRow<String> = self.table.decode(row)?;
                DecodedRow {
                    full_name: row.full_name,
                    tag: row.flags,
                    payload: Payload::String(row.value),
                }
            }
            TypeTag::TH1F => self.histogram_row(row, Payload::TH1F)?,
            TypeTag::TH1S => self.histogram_row(row, Payload::TH1S)?,
            TypeTag::TH1D => self.histogram_row(row, Payload::TH1D)?,
            TypeTag::TH2F => self.histogram_row(row, Payload::TH2F)?,
            TypeTag::TH2S => self.histogram_row(row, Payload::TH2S)?,
            TypeTag::TH2D => self.histogram_row(row, Payload::TH2D)?,
            TypeTag::TH3F => self.histogram_row(row, Payload::TH3F)?,
            TypeTag::TProfile => self.histogram_row(row, Payload::TProfile)?,
            TypeTag::TProfile2D => self.histogram_row(row, Payload::TProfile2D)?,
        };
        Ok(decoded)
    }

    /// Decode a histogram row, check it fits this reader's kind and round its
    /// cells to the kind's bin storage
    fn histogram_row(&self, row: u64, wrap: fn(Histogram) -> Payload) -> SourceResult<DecodedRow> {
        let ElementRow {
            full_name,
            flags,
            value: mut histogram,
        } = self.table.decode::<ElementRow<Histogram>>(row)?;

        let fits_kind = self.type_tag.dimension() == Some(histogram.dimension())
            && self.type_tag.is_profile() == histogram.is_profile();
        if !fits_kind || !histogram.is_well_formed() {
            return Err(SourceError::MalformedHistogram {
                table: self.type_tag.table_key().to_string(),
                row,
                name: full_name,
            });
        }
        if let Some(storage) = self.type_tag.bin_storage() {
            histogram.normalize(storage);
        }

        Ok(DecodedRow {
            full_name,
            tag: flags,
            payload: wrap(histogram),
        })
    }

    /// Decode row `row` and fold it into `store`
    ///
    /// Names are looked up in canonical form, so `/A/b` and `A/b` address the
    /// same element. Elements booked from lumi-scoped rows get the lumi flag.
    pub fn decode_and_apply(
        &self,
        row: u64,
        store: &mut dyn ElementStore,
        lumi_scoped: bool,
    ) -> SourceResult<Applied> {
        let decoded = self.decode(row)?;
        let full_name = normalize_name(&decoded.full_name);

        let outcome = match store.get_mut(&full_name) {
            Some(element) => merge_into(element, decoded.payload).into(),
            None => {
                let (path, name) = split_name(&full_name);
                store.cd(path);
                let element = store.book(name, decoded.payload);
                if lumi_scoped {
                    element.set_lumi_flag();
                }
                ApplyOutcome::Created
            }
        };

        if decoded.tag != 0 {
            store.tag(&full_name, decoded.tag);
        }

        Ok(Applied {
            name: full_name,
            outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{Axis, DqmStore};

    fn int_table(rows: &[(&str, i64)]) -> Table {
        let mut table = Table::new(TypeTag::Int.table_key());
        for (name, value) in rows {
            table.push_row(&ElementRow::new(*name, *value)).unwrap();
        }
        table
    }

    #[test]
    fn test_decode_scalars() {
        let reader = RecordReader::new(TypeTag::Int, int_table(&[("A/x", 5)]));
        let decoded = reader.decode(0).unwrap();
        assert_eq!(decoded.full_name, "A/x");
        assert_eq!(decoded.payload, Payload::Int(5));
        assert_eq!(decoded.tag, 0);

        let table = Table::new("Strings")
            .with_row(&ElementRow::new("A/s", "hello".to_string()).tagged(9))
            .unwrap();
        let reader = RecordReader::new(TypeTag::String, table);
        let decoded = reader.decode(0).unwrap();
        assert_eq!(decoded.payload, Payload::String("hello".to_string()));
        assert_eq!(decoded.tag, 9);
    }

    #[test]
    fn test_decode_histogram_kind() {
        let mut h = Histogram::new_1d(4, 0.0, 4.0);
        h.fill(&[1.5], 2.0);
        let table = Table::new("TH1Ds")
            .with_row(&ElementRow::new("H/h", h.clone()))
            .unwrap();
        let reader = RecordReader::new(TypeTag::TH1D, table);
        assert_eq!(reader.decode(0).unwrap().payload, Payload::TH1D(h));
    }

    #[test]
    fn test_decode_rejects_malformed_histogram() {
        let mut value = serde_json::to_value(Histogram::new_1d(4, 0.0, 4.0)).unwrap();
        value["contents"] = serde_json::json!([1.0, 2.0]);
        let short: Histogram = serde_json::from_value(value).unwrap();
        let table = Table::new("TH1Fs")
            .with_row(&ElementRow::new("H/h", short))
            .unwrap();
        let reader = RecordReader::new(TypeTag::TH1F, table);

        let mut store = DqmStore::new();
        assert!(matches!(
            reader.decode_and_apply(0, &mut store, false),
            Err(SourceError::MalformedHistogram { row: 0, .. })
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_decode_rejects_wrong_dimension() {
        let h = Histogram::new_2d(Axis::new(2, 0.0, 2.0), Axis::new(2, 0.0, 2.0));
        let table = Table::new("TH1Ds").with_row(&ElementRow::new("H/h", h)).unwrap();
        let reader = RecordReader::new(TypeTag::TH1D, table);
        assert!(matches!(
            reader.decode(0),
            Err(SourceError::MalformedHistogram { .. })
        ));
    }

    #[test]
    fn test_short_storage_clamped_when_booked() {
        let mut h = Histogram::new_1d(2, 0.0, 2.0);
        h.fill(&[0.5], 40000.0);
        let table = Table::new("TH1Ss").with_row(&ElementRow::new("H/s", h)).unwrap();
        let reader = RecordReader::new(TypeTag::TH1S, table);
        let mut store = DqmStore::new();

        let applied = reader.decode_and_apply(0, &mut store, false).unwrap();
        assert_eq!(applied.outcome, ApplyOutcome::Created);
        let booked = store.get("H/s").unwrap().histogram().unwrap();
        assert_eq!(booked.bin_content(1, 0, 0), i16::MAX as f64);
    }

    #[test]
    fn test_decode_out_of_range() {
        let reader = RecordReader::new(TypeTag::Int, int_table(&[]));
        assert!(matches!(reader.decode(0), Err(SourceError::Archive(_))));
    }

    #[test]
    fn test_apply_books_then_merges() {
        let reader = RecordReader::new(
            TypeTag::Int,
            int_table(&[
                ("Det/EventInfo/processedEvents", 7),
                ("Det/EventInfo/processedEvents", 7),
                ("Det/other", 1),
                ("Det/other", 2),
            ]),
        );
        let mut store = DqmStore::new();

        let first = reader.decode_and_apply(0, &mut store, false).unwrap();
        assert_eq!(first.outcome, ApplyOutcome::Created);
        let second = reader.decode_and_apply(1, &mut store, false).unwrap();
        assert_eq!(second.outcome, ApplyOutcome::Merged);
        assert_eq!(
            store.get("Det/EventInfo/processedEvents").unwrap().int_value(),
            Some(14)
        );

        reader.decode_and_apply(2, &mut store, false).unwrap();
        let ignored = reader.decode_and_apply(3, &mut store, false).unwrap();
        assert_eq!(ignored.outcome, ApplyOutcome::Ignored);
        assert_eq!(store.get("Det/other").unwrap().int_value(), Some(1));

        let element = store.get("Det/other").unwrap();
        assert_eq!(element.path(), "Det");
        assert_eq!(element.name(), "other");
        assert!(!element.is_lumi());
    }

    #[test]
    fn test_apply_canonical_names() {
        let table = Table::new("Ints")
            .with_row(&ElementRow::new("/Det/EventInfo/processedEvents", 5i64))
            .unwrap()
            .with_row(&ElementRow::new("/Det/EventInfo/processedEvents", 5i64).tagged(4))
            .unwrap();
        let reader = RecordReader::new(TypeTag::Int, table);
        let mut store = DqmStore::new();

        let first = reader.decode_and_apply(0, &mut store, false).unwrap();
        assert_eq!(first.outcome, ApplyOutcome::Created);
        assert_eq!(first.name, "Det/EventInfo/processedEvents");
        let second = reader.decode_and_apply(1, &mut store, false).unwrap();
        assert_eq!(second.outcome, ApplyOutcome::Merged);

        assert_eq!(store.len(), 1);
        let element = store.get("Det/EventInfo/processedEvents").unwrap();
        assert_eq!(element.int_value(), Some(10));
        assert_eq!(element.tag(), Some(4));
    }

    #[test]
    fn test_apply_lumi_flag_and_tag() {
        let table = Table::new("Floats")
            .with_row(&ElementRow::new("L/rate", 2.5f64).tagged(3))
            .unwrap();
        let reader = RecordReader::new(TypeTag::Float, table);
        let mut store = DqmStore::new();
        reader.decode_and_apply(0, &mut store, true).unwrap();

        let element = store.get("L/rate").unwrap();
        assert!(element.is_lumi());
        assert_eq!(element.tag(), Some(3));
        assert_eq!(element.float_value(), Some(2.5));
    }

    #[test]
    fn test_apply_merge_failure_keeps_element() {
        let table = Table::new("TH1Fs")
            .with_row(&ElementRow::new("H/h", Histogram::new_1d(10, 0.0, 10.0)))
            .unwrap()
            .with_row(&ElementRow::new("H/h", Histogram::new_1d(20, 0.0, 10.0)))
            .unwrap();
        let reader = RecordReader::new(TypeTag::TH1F, table);
        let mut store = DqmStore::new();
        reader.decode_and_apply(0, &mut store, false).unwrap();
        let applied = reader.decode_and_apply(1, &mut store, false).unwrap();

        assert_eq!(
            applied.outcome,
            ApplyOutcome::Failed(MergeError::AxisMismatch)
        );
        assert_eq!(store.get("H/h").unwrap().histogram().unwrap().x.bins, 10);
    }
}
