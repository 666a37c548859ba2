use crate::sink::{CsvFormat, read_csv_records, records_to_dataframe};
use anyhow::Result;
use polars::prelude::*;
use std::path::Path;

pub struct MatchupReportArgs<'a> {
    pub input: &'a Path,
    pub champion: &'a str,
    pub enemy: Option<&'a str>,
    pub minute: u32,
    pub format: CsvFormat,
}

/// Loads stored rows from Parquet, or from CSV for anything else.
pub fn load_rows(path: &Path, format: CsvFormat) -> Result<DataFrame> {
    let is_parquet = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("parquet"))
        .unwrap_or(false);

    if is_parquet {
        let df = LazyFrame::scan_parquet(
            path.to_string_lossy().to_string(),
            ScanArgsParquet::default(),
        )?
        .collect()?;
        return Ok(df);
    }

    Ok(records_to_dataframe(&read_csv_records(path, format)?)?)
}

fn ensure_column(df: &mut DataFrame, name: &str, dtype: DataType) -> PolarsResult<()> {
    if !df.get_column_names().iter().any(|c| *c == name) {
        let series = Series::full_null(name, df.height(), &dtype);
        df.with_column(series)?;
    }
    Ok(())
}

fn diff_columns(minute: u32) -> (String, String, String) {
    (
        format!("Gold Diff {}'", minute),
        format!("CS Diff {}'", minute),
        format!("XP Diff {}'", minute),
    )
}

/// Rows may come from batches with other checkpoint sets.
fn with_required_columns(mut df: DataFrame, minute: u32) -> PolarsResult<DataFrame> {
    let (gold, cs, xp) = diff_columns(minute);
    for name in [gold.as_str(), cs.as_str(), xp.as_str(), "KDA"] {
        ensure_column(&mut df, name, DataType::Float64)?;
    }
    for name in ["Win", "Kills", "Deaths"] {
        ensure_column(&mut df, name, DataType::Int64)?;
    }
    Ok(df)
}

/// Per enemy champion: how `champion` fares in lane and in the game.
pub fn matchup_table(df: DataFrame, champion: &str, minute: u32) -> PolarsResult<DataFrame> {
    let (gold, cs, xp) = diff_columns(minute);
    let df = with_required_columns(df, minute)?;

    df.lazy()
        .filter(col("Champion").eq(lit(champion)))
        .group_by([col("Enemy Champion")])
        .agg([
            col("Match ID").count().alias("Games"),
            col("Win").cast(DataType::Float64).mean().alias("Win Rate"),
            col(gold.as_str())
                .cast(DataType::Float64)
                .mean()
                .alias("Gold Diff (Mean)"),
            col(gold.as_str())
                .cast(DataType::Float64)
                .median()
                .alias("Gold Diff (Median)"),
            col(cs.as_str())
                .cast(DataType::Float64)
                .mean()
                .alias("CS Diff (Mean)"),
            col(cs.as_str())
                .cast(DataType::Float64)
                .median()
                .alias("CS Diff (Median)"),
            col(xp.as_str())
                .cast(DataType::Float64)
                .mean()
                .alias("XP Diff (Mean)"),
            col("Kills").cast(DataType::Float64).mean().alias("Kills"),
            col("Deaths").cast(DataType::Float64).mean().alias("Deaths"),
        ])
        .sort(
            "Games",
            SortOptions {
                descending: true,
                nulls_last: true,
                ..Default::default()
            },
        )
        .collect()
}

/// Games, win rate and KDA of `champion` over every matchup.
pub fn champion_headline(df: DataFrame, champion: &str, minute: u32) -> PolarsResult<DataFrame> {
    let (gold, _, _) = diff_columns(minute);
    let df = with_required_columns(df, minute)?;

    df.lazy()
        .filter(col("Champion").eq(lit(champion)))
        .select([
            col("Match ID").count().alias("Games"),
            col("Win").cast(DataType::Float64).mean().alias("Win Rate"),
            col(gold.as_str())
                .cast(DataType::Float64)
                .mean()
                .alias("Gold Diff (Mean)"),
            col("KDA").cast(DataType::Float64).mean().alias("KDA"),
        ])
        .collect()
}

/// Game-by-game history of one matchup.
pub fn matchup_history(
    df: DataFrame,
    champion: &str,
    enemy: &str,
    minute: u32,
) -> PolarsResult<DataFrame> {
    let (gold, cs, xp) = diff_columns(minute);
    let mut df = with_required_columns(df, minute)?;
    ensure_column(&mut df, "Game Date", DataType::String)?;
    ensure_column(&mut df, "Result", DataType::String)?;

    df.lazy()
        .filter(
            col("Champion")
                .eq(lit(champion))
                .and(col("Enemy Champion").eq(lit(enemy))),
        )
        .select([
            col("Game Date"),
            col("Result"),
            col("KDA"),
            col(gold.as_str()),
            col(cs.as_str()),
            col(xp.as_str()),
        ])
        .collect()
}

pub fn run_matchup_report(args: MatchupReportArgs) -> Result<()> {
    let df = load_rows(args.input, args.format)?;

    println!("== Matchups for {} at {}' ==", args.champion, args.minute);

    let headline = champion_headline(df.clone(), args.champion, args.minute)?;
    println!("{}", headline);

    match args.enemy {
        Some(enemy) => {
            let history = matchup_history(df, args.champion, enemy, args.minute)?;
            println!("{} vs {} ({} games):\n{}", args.champion, enemy, history.height(), history);
        }
        None => {
            let table = matchup_table(df, args.champion, args.minute)?;
            println!("{}", table);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Record;

    fn row(champion: &str, enemy: &str, win: bool, gold_diff: i64) -> Record {
        let mut record = Record::new();
        record.push("Match ID", format!("KR_{}_{}", enemy, gold_diff));
        record.push("Game Date", "2024-02-01T00:00:00+00:00");
        record.push("Champion", champion);
        record.push("Enemy Champion", enemy);
        record.push("Result", if win { "Win" } else { "Loss" });
        record.push("Win", win);
        record.push("Kills", 3i64);
        record.push("Deaths", 1i64);
        record.push("KDA", 4.0);
        record.push("Gold Diff 14'", gold_diff);
        record.push("CS Diff 14'", 10i64);
        record
    }

    fn sample() -> DataFrame {
        let rows = vec![
            row("Ahri", "Zed", true, 400),
            row("Ahri", "Zed", false, -200),
            row("Ahri", "Syndra", true, 100),
            row("Zed", "Ahri", false, -400),
        ];
        records_to_dataframe(&rows).unwrap()
    }

    #[test]
    fn groups_by_enemy_champion() {
        let table = matchup_table(sample(), "Ahri", 14).unwrap();
        assert_eq!(table.height(), 2);

        let enemies = table.column("Enemy Champion").unwrap();
        assert_eq!(enemies.str().unwrap().get(0), Some("Zed"));

        let games = table.column("Games").unwrap();
        assert_eq!(games.u32().unwrap().get(0), Some(2));

        let win_rate = table.column("Win Rate").unwrap();
        assert_eq!(win_rate.f64().unwrap().get(0), Some(0.5));

        let gold = table.column("Gold Diff (Mean)").unwrap();
        assert_eq!(gold.f64().unwrap().get(0), Some(100.0));

        // no XP diff stored: the column exists and is null
        let xp = table.column("XP Diff (Mean)").unwrap();
        assert_eq!(xp.f64().unwrap().get(0), None);
    }

    #[test]
    fn headline_and_history() {
        let headline = champion_headline(sample(), "Ahri", 14).unwrap();
        assert_eq!(headline.column("Games").unwrap().u32().unwrap().get(0), Some(3));

        let history = matchup_history(sample(), "Ahri", "Zed", 14).unwrap();
        assert_eq!(history.height(), 2);
        assert_eq!(history.width(), 6);
    }
}
