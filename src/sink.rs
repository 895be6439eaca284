use std::path::Path;

use anyhow::{Context, Result};
use chrono::SecondsFormat;
use tracing::info;

use crate::model::AggregateResult;

const HEADER: &str = "Restaurant,Dish,Price,Tags,Ingredients,ScrapedAt";
/// Separator inside the Tags and Ingredients fields.
const LIST_DELIMITER: &str = "; ";

/// One output row per dish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuRow {
    pub restaurant: String,
    pub dish: String,
    pub price: String,
    pub tags: String,
    pub ingredients: String,
    pub scraped_at: String,
}

pub fn rows(result: &AggregateResult) -> Vec<MenuRow> {
    result
        .iter()
        .flat_map(|menu| {
            menu.dishes.iter().map(move |d| MenuRow {
                restaurant: menu.restaurant_name.clone(),
                dish: d.name.clone(),
                price: d.price.clone(),
                tags: d.tags.join(LIST_DELIMITER),
                ingredients: d.ingredients.join(LIST_DELIMITER),
                scraped_at: d.extracted_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            })
        })
        .collect()
}

fn csv_escape(s: &str) -> String {
    if s.contains('"') || s.contains(',') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

pub fn render_csv(rows: &[MenuRow]) -> String {
    let mut out = String::from(HEADER);
    out.push('\n');
    for r in rows {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            csv_escape(&r.restaurant),
            csv_escape(&r.dish),
            csv_escape(&r.price),
            csv_escape(&r.tags),
            csv_escape(&r.ingredients),
            csv_escape(&r.scraped_at),
        ));
    }
    out
}

/// Write the whole result to `path`, replacing anything already there.
pub fn write_csv(path: &Path, result: &AggregateResult) -> Result<usize> {
    let rows = rows(result);
    std::fs::write(path, render_csv(&rows))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DishRecord, MenuResult};

    fn sample() -> AggregateResult {
        vec![
            MenuResult {
                restaurant_name: "Can Roca".into(),
                dishes: vec![
                    DishRecord::new(
                        "Arròs negre".into(),
                        "16 €".into(),
                        vec!["main".into(), "rice, seafood".into()],
                        vec!["rice".into(), "squid ink".into()],
                    ),
                    DishRecord::new("Pa".into(), "2€".into(), vec![], vec![]),
                ],
            },
            MenuResult {
                restaurant_name: "Bar \"El Xiringuito\"".into(),
                dishes: vec![DishRecord::new("Bravas".into(), "5€".into(), vec![], vec![])],
            },
        ]
    }

    #[test]
    fn one_row_per_dish() {
        let r = rows(&sample());
        assert_eq!(r.len(), 3);
        assert_eq!(r[0].tags, "main; rice, seafood");
        assert_eq!(r[0].ingredients, "rice; squid ink");
        assert_eq!(r[1].tags, "");
        assert_eq!(r[2].restaurant, "Bar \"El Xiringuito\"");
    }

    #[test]
    fn fields_are_quoted_when_needed() {
        let out = render_csv(&rows(&sample()));
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], HEADER);
        assert!(lines[1].starts_with("Can Roca,Arròs negre,16 €,\"main; rice, seafood\",rice; squid ink,"));
        assert!(lines[3].starts_with("\"Bar \"\"El Xiringuito\"\"\",Bravas,5€,,,"));
    }

    #[test]
    fn empty_result_is_header_only() {
        assert_eq!(render_csv(&rows(&Vec::new())), format!("{}\n", HEADER));
    }

    #[test]
    fn write_replaces_previous_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("menus.csv");
        std::fs::write(&path, "stale\ncontent\nthat is longer than the new file\n").unwrap();

        let n = write_csv(&path, &sample()).unwrap();
        assert_eq!(n, 3);
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(!written.contains("stale"));
        assert_eq!(written.lines().count(), 4);
    }
}
