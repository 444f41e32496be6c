/*!
Recoding of election survey microdata.

The crate turns raw survey answers (free text, birth years, state names) into small
integer codes, attaches the FIPS code of the state of each respondent, and scores
state-level forecasts against the actual results.

All the functions are pure: reading and writing files is left to the caller.

```
use survey_coding::geo::{GeoEntry, GeoReference};
use survey_coding::profile::SurveyProfile;
use survey_coding::recode::RecordErrorPolicy;
use survey_coding::RawRecord;

let reference = GeoReference::new(vec![GeoEntry::from_census("OH", "39", "Ohio")?], Some(57));
let rows = vec![RawRecord::from_pairs(&[
    ("ppethm", "Hispanic"),
    ("ppgender", "Male"),
    ("ppreg4", "Midwest"),
    ("ppstaten", "OH"),
    ("age_grp2", "18 thru 34"),
    ("PARTYID", "A Democrat"),
    ("TM3155Y23", "Joe Biden (Democrat)"),
    ("pppa1648", "Catholic"),
    ("edu_general", "No college degree"),
])];
let out = SurveyProfile::reuters().run(&rows, &reference, RecordErrorPolicy::Drop)?;
assert_eq!(out.records[0].geo_id, Some(39));
# Ok::<(), Box<dyn std::error::Error>>(())
```
*/

mod config;

pub mod census;
pub mod codes;
pub mod geo;
pub mod manual;
pub mod profile;
pub mod recode;
pub mod results;
pub mod score;
pub mod tables;

pub use crate::config::*;
