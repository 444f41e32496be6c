use log::{debug, info, warn};
use snafu::prelude::*;

use crate::codes::{CodeTable, TableError};
use crate::config::*;
use crate::geo::{join_geography, GeoKey, GeoReference, UnmatchedGeography};
use crate::recode::{BatchError, RecodeError, RecordErrorPolicy, Recoder};
use crate::tables::*;

/// Name of the output column holding the FIPS code.
pub const GEO_ID_COLUMN: &str = "STATEFP";

#[derive(Debug, Snafu, PartialEq)]
pub enum ProfileError {
    #[snafu(display("unknown survey profile {name:?}"))]
    UnknownProfile { name: String },
    #[snafu(display("profile {profile} has no coded field {field}"))]
    UnknownField { profile: String, field: String },
    #[snafu(display("profile {profile} does not filter respondents by vote choice"))]
    NoEligibilityFilter { profile: String },
    #[snafu(display("invalid code table"))]
    InvalidTable { source: TableError },
    #[snafu(display("record {row} could not be prepared"))]
    Preparation { row: usize, source: RecodeError },
    #[snafu(display("recoding failed"))]
    Recoding { source: BatchError },
}

/// Keeps the respondents that picked one of the choices in any of the fields.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Eligibility {
    pub fields: Vec<String>,
    /// Normalized choices.
    pub choices: Vec<String>,
}

impl Eligibility {
    pub fn new(fields: &[&str], choices: &[&str]) -> Eligibility {
        Eligibility {
            fields: fields.iter().map(|s| s.to_string()).collect(),
            choices: choices.iter().map(|s| normalize_text(s)).collect(),
        }
    }

    pub fn accepts(&self, record: &RawRecord) -> Result<bool, RecodeError> {
        for f in self.fields.iter() {
            let v = record
                .get(f)
                .context(crate::recode::MissingFieldSnafu { field: f })?;
            if let Some(t) = v.normalized_text() {
                if self.choices.contains(&t) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}

/// The recoding pipeline of one data source.
#[derive(PartialEq, Debug, Clone)]
pub struct SurveyProfile {
    pub name: String,
    /// (raw column, semantic column)
    pub renames: Vec<(String, String)>,
    /// Trim and lowercase all the text values before anything else.
    pub normalize_values: bool,
    pub eligibility: Option<Eligibility>,
    pub recoder: Recoder,
    pub geo_field: String,
    pub geo_key: GeoKey,
}

#[derive(PartialEq, Debug, Clone)]
pub struct ProfileOutcome {
    pub records: Vec<RecodedRecord>,
    /// Number of respondents removed by the eligibility filter.
    pub ineligible: usize,
    /// Records that could not be renamed or filtered, indexed in the input.
    pub rejected: Vec<(usize, RecodeError)>,
    /// Records that failed to recode, indexed after the eligibility filter.
    pub dropped: Vec<(usize, RecodeError)>,
    pub unmatched: Vec<UnmatchedGeography>,
}

/// The respondents left after renaming and filtering.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct Prepared {
    pub records: Vec<RawRecord>,
    pub ineligible: usize,
    /// Only filled with `RecordErrorPolicy::Drop`.
    pub rejected: Vec<(usize, RecodeError)>,
}

fn renames(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect()
}

impl SurveyProfile {
    /// The COMETrends 2020 pre-election poll.
    pub fn comet() -> Result<SurveyProfile, ProfileError> {
        let recoder = Recoder::new()
            .field(
                "age_group",
                "birth_year",
                comet_age().context(InvalidTableSnafu {})?,
            )
            .field("gender_coded", "gender", comet_gender())
            .field("education_coded", "education", comet_education())
            .field("race_coded", "race", comet_race())
            .field("issue_coded", "most_imp_issue", comet_issue())
            .fields("vote_coded", &["voted_for", "plan_to_vote_for"], comet_vote())
            .field("region_coded", "region", region());
        Ok(SurveyProfile {
            name: "comet".to_string(),
            renames: renames(&[
                ("q3", "birth_year"),
                ("q4", "gender"),
                ("q5", "education"),
                ("q6", "race"),
                ("q6_6_text", "race_other"),
                ("q7", "state"),
                ("q10", "most_imp_issue"),
                ("q54", "voted_for"),
                ("q56", "plan_to_vote_for"),
                ("regnz", "region"),
            ]),
            normalize_values: false,
            eligibility: Some(Eligibility::new(
                &["voted_for", "plan_to_vote_for"],
                &COMET_VOTE_CHOICES,
            )),
            recoder,
            geo_field: "state".to_string(),
            geo_key: GeoKey::Name,
        })
    }

    /// The Reuters/Ipsos large sample survey (January 2024).
    pub fn reuters() -> SurveyProfile {
        let recoder = Recoder::new()
            .field("age_group_coded", "age_group", reuters_age())
            .field("gender_coded", "gender", reuters_gender())
            .field("education_coded", "education", reuters_education())
            .field("race_coded", "race", reuters_race())
            .field("vote_choice_coded", "vote_choice", reuters_vote())
            .field("region_coded", "region", region())
            .field("party_id_coded", "party_id", reuters_party())
            .field("religion_coded", "religion", reuters_religion());
        SurveyProfile {
            name: "reuters".to_string(),
            renames: renames(&[
                ("ppethm", "race"),
                ("ppgender", "gender"),
                ("ppreg4", "region"),
                ("ppstaten", "state_abb"),
                ("age_grp2", "age_group"),
                ("PARTYID", "party_id"),
                ("TM3155Y23", "vote_choice"),
                ("pppa1648", "religion"),
                ("edu_general", "education"),
            ]),
            normalize_values: true,
            eligibility: Some(Eligibility::new(&["vote_choice"], &REUTERS_VOTE_CHOICES)),
            recoder,
            geo_field: "state_abb".to_string(),
            geo_key: GeoKey::Abbreviation,
        }
    }

    /// Census API tables: nothing to recode, only the state to join.
    pub fn census() -> SurveyProfile {
        SurveyProfile {
            name: "census".to_string(),
            renames: renames(&[("NAME", "state"), ("state", "state_fips")]),
            normalize_values: false,
            eligibility: None,
            recoder: Recoder::new(),
            geo_field: "state".to_string(),
            geo_key: GeoKey::Name,
        }
    }

    pub fn by_name(name: &str) -> Result<SurveyProfile, ProfileError> {
        match name {
            "comet" => SurveyProfile::comet(),
            "reuters" => Ok(SurveyProfile::reuters()),
            "census" => Ok(SurveyProfile::census()),
            x => UnknownProfileSnafu { name: x }.fail(),
        }
    }

    /// Replaces the accepted vote choices.
    pub fn with_eligible_choices(
        mut self,
        choices: &[String],
    ) -> Result<SurveyProfile, ProfileError> {
        let e = self.eligibility.as_mut().context(NoEligibilityFilterSnafu {
            profile: &self.name,
        })?;
        e.choices = choices.iter().map(|s| normalize_text(s)).collect();
        Ok(self)
    }

    /// Replaces the code table of one of the coded fields.
    pub fn with_table(
        mut self,
        output: &str,
        table: CodeTable,
    ) -> Result<SurveyProfile, ProfileError> {
        let name = self.name.clone();
        let coder = self
            .recoder
            .coder_mut(output)
            .context(UnknownFieldSnafu {
                profile: name,
                field: output,
            })?;
        coder.table = table;
        Ok(self)
    }

    fn prepare_record(&self, r: &RawRecord) -> Result<Option<RawRecord>, RecodeError> {
        let mut r2 = r.renamed(&self.renames)?;
        if self.normalize_values {
            r2 = r2.normalized();
        }
        let keep = match &self.eligibility {
            Some(e) => e.accepts(&r2)?,
            None => true,
        };
        Ok(if keep { Some(r2) } else { None })
    }

    /// Renames, normalizes and filters the respondents. The input is left untouched.
    ///
    /// A record that cannot be renamed or filtered is handled like a recoding error.
    pub fn prepare(
        &self,
        records: &[RawRecord],
        policy: RecordErrorPolicy,
    ) -> Result<Prepared, ProfileError> {
        let mut res = Prepared::default();
        for (row, r) in records.iter().enumerate() {
            match self.prepare_record(r) {
                Ok(Some(r2)) => res.records.push(r2),
                Ok(None) => res.ineligible += 1,
                Err(e) => match policy {
                    RecordErrorPolicy::Abort => {
                        return Err(e).context(PreparationSnafu { row });
                    }
                    RecordErrorPolicy::Drop => {
                        warn!("Dropping record {}: {}", row, e);
                        res.rejected.push((row, e));
                    }
                },
            }
        }
        debug!(
            "prepare: profile {}: {} of {} records eligible, {} rejected",
            self.name,
            res.records.len(),
            records.len(),
            res.rejected.len()
        );
        Ok(res)
    }

    /// Runs the full pipeline: prepare, recode, join the geography.
    pub fn run(
        &self,
        records: &[RawRecord],
        reference: &GeoReference,
        policy: RecordErrorPolicy,
    ) -> Result<ProfileOutcome, ProfileError> {
        let prepared = self.prepare(records, policy)?;
        let recoded = self
            .recoder
            .recode_all(&prepared.records, policy)
            .context(RecodingSnafu {})?;
        let joined = join_geography(recoded.records, &self.geo_field, self.geo_key, reference);
        info!(
            "Profile {}: {} records out, {} ineligible, {} dropped, {} without geography",
            self.name,
            joined.records.len(),
            prepared.ineligible,
            prepared.rejected.len() + recoded.dropped.len(),
            joined.unmatched.len()
        );
        Ok(ProfileOutcome {
            records: joined.records,
            ineligible: prepared.ineligible,
            rejected: prepared.rejected,
            dropped: recoded.dropped,
            unmatched: joined.unmatched,
        })
    }

    /// The columns of the output table.
    ///
    /// Without `keep_all`, only the coded fields and the FIPS code are written.
    pub fn output_columns(&self, records: &[RecodedRecord], keep_all: bool) -> Vec<String> {
        let mut cols: Vec<String> = Vec::new();
        if keep_all {
            if let Some(r) = records.first() {
                cols.extend(r.raw.names());
            }
        }
        cols.extend(self.recoder.output_fields());
        cols.push(GEO_ID_COLUMN.to_string());
        cols
    }

    /// Flattens the records into text rows matching `output_columns`. Missing values are empty.
    pub fn to_rows(&self, records: &[RecodedRecord], keep_all: bool) -> Vec<Vec<String>> {
        let raw_cols: Vec<String> = match (keep_all, records.first()) {
            (true, Some(r)) => r.raw.names(),
            _ => Vec::new(),
        };
        records
            .iter()
            .map(|r| {
                let mut row: Vec<String> = raw_cols
                    .iter()
                    .map(|c| r.raw.get(c).map(|v| v.to_string()).unwrap_or_default())
                    .collect();
                row.extend(r.coded.iter().map(|(_, c)| c.to_string()));
                row.push(r.geo_id.map(|x| x.to_string()).unwrap_or_default());
                row
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::Closed;
    use crate::geo::GeoEntry;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn reference() -> GeoReference {
        GeoReference::new(
            vec![
                GeoEntry::from_census("TX", "48", "Texas").unwrap(),
                GeoEntry::from_census("OH", "39", "Ohio").unwrap(),
            ],
            Some(57),
        )
    }

    fn comet_row(q3: &str, q4: &str, q7: &str, q54: &str, q56: &str) -> RawRecord {
        RawRecord::from_pairs(&[
            ("q3", q3),
            ("q4", q4),
            ("q5", "high school graduate"),
            ("q6", "hispanic"),
            ("q6_6_text", ""),
            ("q7", q7),
            ("q10", "economy"),
            ("q54", q54),
            ("q56", q56),
            ("regnz", "South"),
        ])
    }

    #[test]
    fn comet_pipeline() {
        init_logger();
        let rows = vec![
            comet_row("1960", "male", "Texas", "voted for joe biden", ""),
            comet_row("1990", "female", "ohio ", "", "will vote for donald trump"),
            comet_row("1990", "female", "ohio", "", "not sure"),
            comet_row("1990", "female", "Narnia", "voted for donald trump", ""),
        ];
        let out = SurveyProfile::comet()
            .unwrap()
            .run(&rows, &reference(), RecordErrorPolicy::Abort)
            .unwrap();
        assert_eq!(out.records.len(), 3);
        assert_eq!(out.ineligible, 1);
        assert_eq!(out.unmatched.len(), 1);

        let r0 = &out.records[0];
        assert_eq!(r0.coded_value("age_group"), Some(CodedValue::Code(2)));
        assert_eq!(r0.coded_value("gender_coded"), Some(CodedValue::Code(1)));
        assert_eq!(r0.coded_value("education_coded"), Some(CodedValue::Code(1)));
        assert_eq!(r0.coded_value("race_coded"), Some(CodedValue::Code(4)));
        assert_eq!(r0.coded_value("issue_coded"), Some(CodedValue::Code(9)));
        assert_eq!(r0.coded_value("vote_coded"), Some(CodedValue::Code(0)));
        assert_eq!(r0.coded_value("region_coded"), Some(CodedValue::Code(3)));
        assert_eq!(r0.geo_id, Some(48));

        let r1 = &out.records[1];
        assert_eq!(r1.coded_value("vote_coded"), Some(CodedValue::Code(1)));
        assert_eq!(r1.geo_id, Some(39));
        assert_eq!(out.records[2].geo_id, None);
    }

    #[test]
    fn coded_only_output() {
        let p = SurveyProfile::comet().unwrap();
        let rows = vec![comet_row("1960", "male", "Texas", "voted for joe biden", "")];
        let out = p.run(&rows, &reference(), RecordErrorPolicy::Abort).unwrap();
        assert_eq!(
            p.output_columns(&out.records, false),
            vec![
                "age_group",
                "gender_coded",
                "education_coded",
                "race_coded",
                "issue_coded",
                "vote_coded",
                "region_coded",
                "STATEFP"
            ]
        );
        assert_eq!(
            p.to_rows(&out.records, false),
            vec![vec!["2", "1", "1", "4", "9", "0", "3", "48"]]
        );
        let all = p.output_columns(&out.records, true);
        assert_eq!(all[0], "birth_year");
        assert_eq!(all.len(), 18);
        assert_eq!(p.to_rows(&out.records, true)[0].len(), 18);
    }

    #[test]
    fn reuters_pipeline() {
        let row = RawRecord::from_pairs(&[
            ("ppethm", " White, Non-Hispanic "),
            ("ppgender", "Female"),
            ("ppreg4", "Midwest"),
            ("ppstaten", "OH"),
            ("age_grp2", "55+"),
            ("PARTYID", "An independent"),
            ("TM3155Y23", "Joe Biden (Democrat)"),
            ("pppa1648", "Wicca"),
            ("edu_general", "College degree or more"),
        ]);
        let skipped = row.with("TM3155Y23", RawValue::Text("Not sure".to_string()));
        let p = SurveyProfile::reuters();
        let out = p
            .run(&[row, skipped], &reference(), RecordErrorPolicy::Abort)
            .unwrap();
        assert_eq!(out.records.len(), 1);
        assert_eq!(
            p.to_rows(&out.records, false),
            vec![vec!["3", "0", "2", "1", "0", "2", "2", "-9", "39"]]
        );
        // Values are normalized in the kept columns.
        assert_eq!(
            out.records[0].raw.get("race"),
            Some(&RawValue::Text("white, non-hispanic".to_string()))
        );
    }

    #[test]
    fn missing_eligibility_field() {
        let rows = vec![RawRecord::from_pairs(&[("q3", "1970")])];
        assert!(matches!(
            SurveyProfile::comet()
                .unwrap()
                .prepare(&rows, RecordErrorPolicy::Abort),
            Err(ProfileError::Preparation { row: 0, .. })
        ));
    }

    #[test]
    fn drop_policy_covers_eligibility() {
        init_logger();
        let full = comet_row("1960", "male", "Texas", "voted for joe biden", "");
        let mut partial = RawRecord::new();
        for (n, v) in full.fields() {
            if n != "q54" {
                partial = partial.with(n, v.clone());
            }
        }
        let rows = vec![full, partial];
        let p = SurveyProfile::comet().unwrap();

        let out = p.run(&rows, &reference(), RecordErrorPolicy::Drop).unwrap();
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.ineligible, 0);
        assert_eq!(
            out.rejected,
            vec![(
                1,
                RecodeError::MissingField {
                    field: "voted_for".to_string()
                }
            )]
        );
        assert!(out.dropped.is_empty());

        assert!(matches!(
            p.run(&rows, &reference(), RecordErrorPolicy::Abort),
            Err(ProfileError::Preparation { row: 1, .. })
        ));
    }

    #[test]
    fn coded_values_are_declared_codes() {
        let comet = SurveyProfile::comet().unwrap();
        let comet_rows = vec![
            comet_row("1960", "male", "Texas", "voted for joe biden", ""),
            comet_row("2005", "???", "Ohio", "", "will vote for donald trump"),
            comet_row("1850", "", "Narnia", "voted for donald trump", ""),
            comet_row("1999", "other", "ohio", "", "will vote for joe biden"),
        ];
        let reuters = SurveyProfile::reuters();
        let reuters_row = RawRecord::from_pairs(&[
            ("ppethm", "Martian"),
            ("ppgender", ""),
            ("ppreg4", "Midwest"),
            ("ppstaten", "TX"),
            ("age_grp2", "120+"),
            ("PARTYID", "An independent"),
            ("TM3155Y23", "Donald Trump (Republican)"),
            ("pppa1648", "Wicca"),
            ("edu_general", "Kindergarten"),
        ]);
        let reuters_rows = vec![
            reuters_row.clone(),
            reuters_row.with("ppethm", RawValue::Text("Hispanic".to_string())),
        ];
        for (p, rows) in [(comet, comet_rows), (reuters, reuters_rows)] {
            let out = p.run(&rows, &reference(), RecordErrorPolicy::Abort).unwrap();
            assert_eq!(out.records.len(), rows.len());
            for r in out.records.iter() {
                for coder in p.recoder.coders() {
                    let v = r.coded_value(&coder.output).unwrap();
                    assert!(
                        coder.table.declared_codes().contains(&v),
                        "{} produced {:?}",
                        coder.output,
                        v
                    );
                }
            }
        }
    }

    #[test]
    fn overrides() {
        let p = SurveyProfile::comet()
            .unwrap()
            .with_table(
                "age_group",
                CodeTable::buckets("age_group", &[0.0, 1980.0, 2010.0], &[1, 0], Closed::Left)
                    .unwrap(),
            )
            .unwrap()
            .with_eligible_choices(&["Voted for Joe Biden".to_string()])
            .unwrap();
        let rows = vec![
            comet_row("1980", "male", "Texas", "voted for joe biden", ""),
            comet_row("1980", "male", "Texas", "voted for donald trump", ""),
        ];
        let out = p.run(&rows, &reference(), RecordErrorPolicy::Abort).unwrap();
        assert_eq!(out.records.len(), 1);
        assert_eq!(
            out.records[0].coded_value("age_group"),
            Some(CodedValue::Code(0))
        );

        assert!(matches!(
            SurveyProfile::census().with_eligible_choices(&[]),
            Err(ProfileError::NoEligibilityFilter { .. })
        ));
        assert!(matches!(
            SurveyProfile::reuters().with_table("nope", CodeTable::text("x")),
            Err(ProfileError::UnknownField { .. })
        ));
        assert!(matches!(
            SurveyProfile::by_name("gallup"),
            Err(ProfileError::UnknownProfile { .. })
        ));
    }

    #[test]
    fn census_profile() {
        let rows = vec![RawRecord::from_pairs(&[("NAME", "Texas"), ("B01", "12")])];
        let p = SurveyProfile::census();
        let out = p.run(&rows, &reference(), RecordErrorPolicy::Abort).unwrap();
        assert_eq!(out.records[0].geo_id, Some(48));
        assert_eq!(p.output_columns(&out.records, true), vec!["state", "B01", "STATEFP"]);
    }

    #[test]
    fn census_state_code_column() {
        let rows = crate::census::records_from_rows(&[
            vec!["NAME".to_string(), "B02015_009E".to_string(), "state".to_string()],
            vec!["Ohio".to_string(), "1234".to_string(), "39".to_string()],
            vec!["Texas".to_string(), "77".to_string(), "48".to_string()],
        ])
        .unwrap();
        let p = SurveyProfile::census();
        let out = p.run(&rows, &reference(), RecordErrorPolicy::Abort).unwrap();
        assert_eq!(out.records.len(), 2);
        assert!(out.rejected.is_empty());
        assert_eq!(
            p.output_columns(&out.records, true),
            vec!["state", "B02015_009E", "state_fips", "STATEFP"]
        );
        assert_eq!(
            p.to_rows(&out.records, true)[0],
            vec!["Ohio", "1234", "39", "39"]
        );
    }
}
