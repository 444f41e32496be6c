use log::{debug, info, warn};
use snafu::prelude::*;

use crate::codes::{CodeTable, TableKind};
use crate::config::*;

/// Errors that prevent a single record from being recoded.
#[derive(Debug, Snafu, PartialEq, Clone)]
#[snafu(visibility(pub(crate)))]
pub enum RecodeError {
    #[snafu(display("field {field} is missing from the record"))]
    MissingField { field: String },
    #[snafu(display("cannot convert {value:?} in field {field} to a number"))]
    TypeConversion { field: String, value: String },
    #[snafu(display("two columns are named {field}"))]
    DuplicateField { field: String },
}

#[derive(Debug, Snafu, PartialEq)]
pub enum BatchError {
    #[snafu(display("record {row} could not be recoded"))]
    Record { row: usize, source: RecodeError },
}

/// What to do with a record that fails to recode.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum RecordErrorPolicy {
    /// Skip the record (and report it).
    Drop,
    /// Stop at the first failing record.
    Abort,
}

/// Produces one coded output field from one or more input fields.
///
/// With several inputs, a rule matches when any of the inputs satisfies it. The
/// rules are still tried in order, so the first rule that matches any input wins.
#[derive(PartialEq, Debug, Clone)]
pub struct FieldCoder {
    pub output: String,
    pub inputs: Vec<String>,
    pub table: CodeTable,
}

impl FieldCoder {
    pub fn code(&self, record: &RawRecord) -> Result<CodedValue, RecodeError> {
        let mut values: Vec<&RawValue> = Vec::new();
        for input in self.inputs.iter() {
            let v = record
                .get(input)
                .context(MissingFieldSnafu { field: input })?;
            values.push(v);
        }
        let found = match self.table.kind() {
            TableKind::Text => {
                let texts: Vec<Option<String>> =
                    values.iter().map(|v| v.normalized_text()).collect();
                self.table.lookup_texts(&texts)
            }
            TableKind::Numeric => {
                let mut numbers: Vec<f64> = Vec::new();
                for (input, v) in self.inputs.iter().zip(values.iter()) {
                    let x = v.as_number().context(TypeConversionSnafu {
                        field: input,
                        value: v.to_string(),
                    })?;
                    numbers.push(x);
                }
                self.table.lookup_numbers(&numbers)
            }
        };
        Ok(found
            .map(CodedValue::Code)
            .unwrap_or_else(|| self.table.default_value()))
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct RecodeOutcome {
    pub records: Vec<RecodedRecord>,
    /// The index (in the input) and the error of each dropped record.
    pub dropped: Vec<(usize, RecodeError)>,
}

/// Applies a list of code tables to records.
///
/// ```
/// use survey_coding::codes::CodeTable;
/// use survey_coding::recode::Recoder;
/// use survey_coding::{CodedValue, RawRecord};
///
/// let recoder = Recoder::new()
///     .field("gender_coded", "gender", CodeTable::text("gender").equals("male", 1).equals("female", 0));
///
/// let rec = recoder.recode_record(&RawRecord::from_pairs(&[("gender", "Female ")]))?;
/// assert_eq!(rec.coded_value("gender_coded"), Some(CodedValue::Code(0)));
/// # Ok::<(), survey_coding::recode::RecodeError>(())
/// ```
#[derive(PartialEq, Debug, Clone, Default)]
pub struct Recoder {
    coders: Vec<FieldCoder>,
}

impl Recoder {
    pub fn new() -> Recoder {
        Recoder { coders: Vec::new() }
    }

    pub fn field(self, output: &str, input: &str, table: CodeTable) -> Recoder {
        self.fields(output, &[input], table)
    }

    pub fn fields(mut self, output: &str, inputs: &[&str], table: CodeTable) -> Recoder {
        self.coders.push(FieldCoder {
            output: output.to_string(),
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            table,
        });
        self
    }

    pub fn coders(&self) -> &[FieldCoder] {
        &self.coders
    }

    pub fn coder_mut(&mut self, output: &str) -> Option<&mut FieldCoder> {
        self.coders.iter_mut().find(|c| c.output == output)
    }

    pub fn output_fields(&self) -> Vec<String> {
        self.coders.iter().map(|c| c.output.clone()).collect()
    }

    /// Recodes one record. The raw record is copied as is in the output.
    pub fn recode_record(&self, record: &RawRecord) -> Result<RecodedRecord, RecodeError> {
        let mut coded: Vec<(String, CodedValue)> = Vec::new();
        for coder in self.coders.iter() {
            coded.push((coder.output.clone(), coder.code(record)?));
        }
        Ok(RecodedRecord {
            raw: record.clone(),
            coded,
            geo_id: None,
        })
    }

    /// Recodes all the records. There is one result per input record, in the same order.
    pub fn recode(&self, records: &[RawRecord]) -> Vec<Result<RecodedRecord, RecodeError>> {
        records.iter().map(|r| self.recode_record(r)).collect()
    }

    /// Recodes all the records, applying the given policy to the failing ones.
    pub fn recode_all(
        &self,
        records: &[RawRecord],
        policy: RecordErrorPolicy,
    ) -> Result<RecodeOutcome, BatchError> {
        debug!(
            "recode_all: {:?} records, fields: {:?}, policy: {:?}",
            records.len(),
            self.output_fields(),
            policy
        );
        let mut res: Vec<RecodedRecord> = Vec::new();
        let mut dropped: Vec<(usize, RecodeError)> = Vec::new();
        for (row, r) in self.recode(records).into_iter().enumerate() {
            match (r, policy) {
                (Ok(rec), _) => res.push(rec),
                (Err(e), RecordErrorPolicy::Abort) => {
                    return Err(e).context(RecordSnafu { row });
                }
                (Err(e), RecordErrorPolicy::Drop) => {
                    warn!("recode_all: dropping record {}: {}", row, e);
                    dropped.push((row, e));
                }
            }
        }
        info!(
            "Recoded {} records ({} dropped)",
            res.len(),
            dropped.len()
        );
        Ok(RecodeOutcome {
            records: res,
            dropped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::Closed;

    fn recoder() -> Recoder {
        Recoder::new()
            .field(
                "age_group",
                "birth_year",
                CodeTable::buckets(
                    "age_group",
                    &[0.0, 1965.0, 1985.0, 2002.0],
                    &[2, 1, 0],
                    Closed::Right,
                )
                .unwrap(),
            )
            .field(
                "race_coded",
                "race",
                CodeTable::text("race")
                    .equals("white, non hispanic", 1)
                    .equals("african american", 2),
            )
            .fields(
                "vote_coded",
                &["voted_for", "plan_to_vote_for"],
                CodeTable::text("vote")
                    .one_of(&["voted for joe biden", "will vote for joe biden"], 0)
                    .one_of(&["voted for donald trump", "will vote for donald trump"], 1),
            )
    }

    fn respondent(birth_year: &str, race: &str, voted: &str, plan: &str) -> RawRecord {
        RawRecord::from_pairs(&[
            ("birth_year", birth_year),
            ("race", race),
            ("voted_for", voted),
            ("plan_to_vote_for", plan),
        ])
    }

    #[test]
    fn codes_all_fields() {
        let r = recoder()
            .recode_record(&respondent("1965", "African American", "", "Will vote for Joe Biden"))
            .unwrap();
        assert_eq!(
            r.coded,
            vec![
                ("age_group".to_string(), CodedValue::Code(2)),
                ("race_coded".to_string(), CodedValue::Code(2)),
                ("vote_coded".to_string(), CodedValue::Code(0)),
            ]
        );
        assert_eq!(r.geo_id, None);
    }

    #[test]
    fn unmatched_text_is_never_copied() {
        let r = recoder()
            .recode_record(&respondent("1986", "martian", "voted for donald trump", ""))
            .unwrap();
        assert_eq!(r.coded_value("race_coded"), Some(CodedValue::Missing));
        assert_eq!(r.coded_value("age_group"), Some(CodedValue::Code(0)));
        assert_eq!(r.coded_value("vote_coded"), Some(CodedValue::Code(1)));
    }

    #[test]
    fn missing_field() {
        let r = RawRecord::from_pairs(&[("birth_year", "1970"), ("race", "asian")]);
        assert_eq!(
            recoder().recode_record(&r),
            Err(RecodeError::MissingField {
                field: "voted_for".to_string()
            })
        );
    }

    #[test]
    fn non_numeric_birth_year() {
        let r = respondent("nineteen", "asian", "", "");
        assert_eq!(
            recoder().recode_record(&r),
            Err(RecodeError::TypeConversion {
                field: "birth_year".to_string(),
                value: "nineteen".to_string()
            })
        );
        // Empty cells cannot be bucketed either.
        assert!(matches!(
            recoder().recode_record(&respondent("", "asian", "", "")),
            Err(RecodeError::TypeConversion { .. })
        ));
        for junk in ["nan", "NaN", "inf"] {
            assert_eq!(
                recoder().recode_record(&respondent(junk, "asian", "", "")),
                Err(RecodeError::TypeConversion {
                    field: "birth_year".to_string(),
                    value: junk.to_string()
                })
            );
        }
    }

    #[test]
    fn same_cardinality_and_determinism() {
        let records = vec![
            respondent("1950", "asian", "", ""),
            respondent("x", "asian", "", ""),
            respondent("1990", "african american", "", ""),
        ];
        let first = recoder().recode(&records);
        let second = recoder().recode(&records);
        assert_eq!(first.len(), 3);
        assert_eq!(first, second);
        assert!(first[1].is_err());
    }

    #[test]
    fn drop_policy() {
        let records = vec![
            respondent("1950", "asian", "", ""),
            respondent("x", "asian", "", ""),
        ];
        let out = recoder()
            .recode_all(&records, RecordErrorPolicy::Drop)
            .unwrap();
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.dropped.len(), 1);
        assert_eq!(out.dropped[0].0, 1);
    }

    #[test]
    fn abort_policy() {
        let records = vec![
            respondent("1950", "asian", "", ""),
            respondent("x", "asian", "", ""),
        ];
        let err = recoder()
            .recode_all(&records, RecordErrorPolicy::Abort)
            .unwrap_err();
        assert!(matches!(err, BatchError::Record { row: 1, .. }));
    }
}
