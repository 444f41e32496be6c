/*!
The lookup tables of the supported surveys.

Codes are shared between the sources where the categories are comparable (race,
education, region, vote choice), so that the coded outputs of different polls can
be stacked.

| field      | codes |
|------------|-------|
| race       | 1 white, 2 black, 3 asian, 4 hispanic, 9 other |
| education  | 1 no college degree, 2 college (any) |
| region     | 1 northeast, 2 midwest, 3 south, 4 west |
| vote       | 0 Biden, 1 Trump |
| gender     | 1 male, 0 otherwise |
*/

use crate::codes::{Closed, CodeTable, TableError};
use crate::config::CodedValue;

pub const COMET_AGE_EDGES: [f64; 4] = [0.0, 1965.0, 1985.0, 2002.0];
pub const COMET_AGE_CODES: [i32; 3] = [2, 1, 0];

pub const COMET_VOTE_CHOICES: [&str; 4] = [
    "will vote for joe biden",
    "voted for joe biden",
    "voted for donald trump",
    "will vote for donald trump",
];

pub const REUTERS_VOTE_CHOICES: [&str; 2] = ["joe biden (democrat)", "donald trump (republican)"];

// ********* Comet *********

/// Birth year to age group, right-closed: `(0, 1965]` is 2, `(1965, 1985]` is 1, `(1985, 2002]` is 0.
pub fn comet_age() -> Result<CodeTable, TableError> {
    CodeTable::buckets("age_group", &COMET_AGE_EDGES, &COMET_AGE_CODES, Closed::Right)
}

pub fn comet_gender() -> CodeTable {
    CodeTable::text("gender")
        .equals("male", 1)
        .default_code(CodedValue::Code(0))
}

pub fn comet_education() -> CodeTable {
    CodeTable::text("education")
        .one_of(&["some high school or less", "high school graduate"], 1)
        .one_of(
            &[
                "community college",
                "some university",
                "graduated university, b.a. or b.sc.",
                "graduate or professional school",
            ],
            2,
        )
}

pub fn comet_race() -> CodeTable {
    CodeTable::text("race")
        .equals("white, non hispanic", 1)
        .equals("african american", 2)
        .equals("hispanic", 4)
        .equals("asian", 3)
        .one_of(&["native american", "other - please specify"], 9)
}

pub fn comet_issue() -> CodeTable {
    let issues = [
        "education",
        "environment",
        "racism",
        "police violence",
        "health care",
        "immigration",
        "inequality in incomes & wealth",
        "corona virus (covid-19) pandemic",
        "poverty",
        "economy",
        "law & order",
        "unemployment",
        "other issue",
        "don't know",
    ];
    issues
        .iter()
        .enumerate()
        .fold(CodeTable::text("most_imp_issue"), |t, (code, issue)| {
            t.equals(issue, code as i32)
        })
}

/// Applied to both the vote already cast and the intended vote.
pub fn comet_vote() -> CodeTable {
    CodeTable::text("vote")
        .one_of(&["voted for joe biden", "will vote for joe biden"], 0)
        .one_of(&["voted for donald trump", "will vote for donald trump"], 1)
}

pub fn region() -> CodeTable {
    CodeTable::text("region")
        .equals("northeast", 1)
        .equals("midwest", 2)
        .equals("south", 3)
        .equals("west", 4)
}

// ********* Reuters / Ipsos *********

pub fn reuters_age() -> CodeTable {
    CodeTable::text("age_group")
        .equals("55+", 3)
        .equals("35 thru 54", 2)
        .equals("18 thru 34", 1)
}

pub fn reuters_gender() -> CodeTable {
    CodeTable::text("gender")
        .equals("male", 1)
        .equals("female", 0)
}

pub fn reuters_education() -> CodeTable {
    CodeTable::text("education")
        .equals("no college degree", 1)
        .equals("college degree or more", 2)
}

pub fn reuters_race() -> CodeTable {
    CodeTable::text("race")
        .equals("white, non-hispanic", 1)
        .equals("hispanic", 4)
        .equals("black or african american, non-hispanic", 2)
        .one_of(&["other, non-hispanic", "2+ races, non-hispanic"], 9)
}

pub fn reuters_vote() -> CodeTable {
    CodeTable::text("vote_choice")
        .equals("joe biden (democrat)", 0)
        .equals("donald trump (republican)", 1)
}

pub fn reuters_party() -> CodeTable {
    CodeTable::text("party_id")
        .equals("a democrat", 0)
        .equals("a republican", 1)
        .equals("an independent", 2)
        .equals("something else", 3)
        .equals("skipped", 4)
}

/// Unknown religions are coded -9 rather than missing.
pub fn reuters_religion() -> CodeTable {
    let religions = [
        "evangelical or protestant christian (baptist, lutheran, methodist, presbyterian, \
         episcopalian, pentecostal, church of christ, etc.)",
        "no religion",
        "catholic",
        "other christian religion",
        "jewish",
        "the church of jesus christ of latter-day saints",
        "refused",
        "jehovah's witness",
        "other non-christian religion",
        "buddhist",
        "hindu",
        "islam/muslim",
        "unitarian (universalist)",
        "greek or russian orthodox",
    ];
    religions
        .iter()
        .enumerate()
        .fold(CodeTable::text("religion"), |t, (code, r)| {
            t.equals(r, code as i32)
        })
        .default_code(CodedValue::Code(-9))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comet_tables() {
        assert_eq!(comet_gender().code_text("Female"), CodedValue::Code(0));
        assert_eq!(comet_gender().code_text("Male"), CodedValue::Code(1));
        assert_eq!(
            comet_education().code_text("Community college"),
            CodedValue::Code(2)
        );
        assert_eq!(comet_race().code_text("Asian"), CodedValue::Code(3));
        assert_eq!(
            comet_race().code_text("Other - please specify"),
            CodedValue::Code(9)
        );
        assert_eq!(comet_issue().code_text("Education"), CodedValue::Code(0));
        assert_eq!(comet_issue().code_text("don't know"), CodedValue::Code(13));
        assert_eq!(region().code_text("Midwest"), CodedValue::Code(2));
        let age = comet_age().unwrap();
        assert_eq!(age.code_number(1965.0), CodedValue::Code(2));
        assert_eq!(age.code_number(1986.0), CodedValue::Code(0));
    }

    #[test]
    fn reuters_tables() {
        assert_eq!(reuters_gender().code_text("other"), CodedValue::Missing);
        assert_eq!(
            reuters_religion().code_text(
                "Evangelical or Protestant Christian (Baptist, Lutheran, Methodist, Presbyterian, \
                 Episcopalian, Pentecostal, Church of Christ, etc.)"
            ),
            CodedValue::Code(0)
        );
        assert_eq!(
            reuters_religion().code_text("Greek or Russian Orthodox"),
            CodedValue::Code(13)
        );
        assert_eq!(reuters_religion().code_text("wicca"), CodedValue::Code(-9));
        assert_eq!(reuters_party().code_text("Skipped"), CodedValue::Code(4));
        assert_eq!(
            reuters_vote().code_text("Donald Trump (Republican)"),
            CodedValue::Code(1)
        );
    }
}
