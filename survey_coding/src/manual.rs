/*!

This is the long-form manual for `survey_coding` and `ppredict`.

## Input formats

* `csv` Comma Separated Values, with a header row. Exports in Windows-1252 are read leniently.
* `xlsx` Excel workbooks. The first worksheet is used unless `excelWorksheetName` is set.
* `json` Census API responses: a list of rows, the first row being the header.

The format is chosen from the extension of the file.

## Survey profiles

### `comet`

COMETrends 2020 pre-election poll (exported to CSV from the STATA file). The columns
`q3 q4 q5 q6 q6_6_text q7 q10 q54 q56 regnz` are renamed to `birth_year gender education race
race_other state most_imp_issue voted_for plan_to_vote_for region`.

Only the respondents who voted (or plan to vote) for one of the two main candidates are kept.
The birth year is bucketed as follows (right-closed):

| birth year      | `age_group` |
|-----------------|-------------|
| 1 to 1965       | 2           |
| 1966 to 1985    | 1           |
| 1986 to 2002    | 0           |
| anything else   | missing     |

The state is joined by name.

### `reuters`

Reuters/Ipsos large sample survey. All the values are trimmed and lowercased. The state is
joined by its postal abbreviation. Unknown religions are coded `-9`.

### `census`

Census API table. The `NAME` column is renamed `state` and joined by state name. The
FIPS code returned by the API in its own `state` column is kept as `state_fips`, as text
("01" stays "01"). No other column is recoded.

## Geographic reference

The reference is the census state file (`national_state2020.txt`):

```text
STATE|STATEFP|STATENS|STATE_NAME
AL|01|01779775|Alabama
```

Entries with a code at or above the cutoff (57 by default) are ignored, which removes the
territories. Names are compared after lowercasing, trimming, and removing footnote markers
(`*`). Records with an unknown state are kept, with an empty `STATEFP`.

## Evaluation

The evaluation compares, for each state, the actual outcome with the outcome predicted by one
or more models:

- the winner: the candidate with strictly more electoral votes. With the `flag` tie policy, a
  tie stops the evaluation; with `trump`, ties count for Trump.
- the margin: a fraction (Trump minus Biden). Percentages such as `3.2%` are accepted.

The summary holds, for each model, the accuracy rate (a state without prediction counts as
an error) and the mean squared error of the margins over the states where both margins are
known.

## Configuration file

```json
{
  "outputSettings": {"outputDirectory": "output", "keepAll": false, "onRecordError": "drop"},
  "geoReference": {"filePath": "national_state2020.txt", "delimiter": "|", "cutoff": 57},
  "surveySources": [
    {"provider": "comet", "filePath": "comet.csv", "outputName": "comet_recoded.csv",
     "ageBuckets": {"edges": [0, 1965, 1985, 2002], "codes": [2, 1, 0], "closed": "right"}}
  ],
  "evaluation": {
    "tiePolicy": "flag",
    "actualResults": {"filePath": "2020_electoral_results.csv"},
    "actualMargins": {"filePath": "actual_margin_result.csv"},
    "predictions": [
      {"name": "ml", "marginPath": "margin_ml.csv", "winnerPath": "pred_ml.csv"}
    ]
  }
}
```

All the paths are relative to the directory of the configuration file.
*/
