//! CircInteractome miRNA search: circRNA → predicted binding-site table.

use async_trait::async_trait;
use scraper::{ElementRef, Html};

use super::http::{build_client, check_status, transport_error, Trust};
use super::mirdb::selector;
use super::PartnerSource;
use crate::cache::CachePayload;
use crate::config::Config;
use crate::error::Result;
use crate::prediction::SiteTable;

const SOURCE_NAME: &str = "CircInteractome";
const RESULT_TABLE: &str = r##"table[border="1"][bordercolor="#006699"]"##;

fn cell_text(cell: &ElementRef) -> String {
    cell.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn span(cell: &ElementRef, attr: &str) -> usize {
    cell.value()
        .attr(attr)
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(1)
        .max(1)
}

/// Parse the result table of a CircInteractome search page
///
/// The table has a two-row header; columns are named `"{top}_{bottom}"` with
/// `colspan` expanded. A top cell spanning both rows names its column
/// `"{top}_{top}"`. Returns `None` when the page has no result table.
pub fn parse_site_table(html: &str) -> Result<Option<SiteTable>> {
    let document = Html::parse_document(html);
    let table_sel = selector(RESULT_TABLE)?;
    let row_sel = selector("tr")?;
    let cell_sel = selector("td, th")?;

    let Some(table) = document.select(&table_sel).next() else {
        return Ok(None);
    };

    let rows: Vec<Vec<ElementRef>> = table
        .select(&row_sel)
        .map(|row| row.select(&cell_sel).collect::<Vec<_>>())
        .filter(|cells| !cells.is_empty())
        .collect();

    if rows.len() < 2 {
        return Ok(None);
    }

    // Top row: (text, spans both header rows)
    let mut top: Vec<(String, bool)> = Vec::new();
    for cell in &rows[0] {
        let text = cell_text(cell);
        let full_height = span(cell, "rowspan") > 1;
        for _ in 0..span(cell, "colspan") {
            top.push((text.clone(), full_height));
        }
    }

    let mut bottom = rows[1].iter().flat_map(|cell| {
        let text = cell_text(cell);
        std::iter::repeat(text).take(span(cell, "colspan"))
    });

    let columns: Vec<String> = top
        .iter()
        .map(|(name, full_height)| {
            let sub = if *full_height {
                name.clone()
            } else {
                bottom.next().unwrap_or_default()
            };
            format!("{}_{}", name, sub)
        })
        .collect();

    let data = expand_rows(&rows[2..], columns.len());
    Ok(Some(SiteTable::new(columns, data)))
}

/// Lay data rows out on a grid of `width` columns
///
/// A cell with `colspan` fills that many columns; one with `rowspan` repeats
/// its text in the same columns of the following rows.
fn expand_rows(rows: &[Vec<ElementRef>], width: usize) -> Vec<Vec<String>> {
    // Per column: text carried down and the number of rows still covered
    let mut carried: Vec<(String, usize)> = vec![(String::new(), 0); width];
    let mut grid = Vec::with_capacity(rows.len());

    for cells in rows {
        let mut values = Vec::with_capacity(width);
        let mut cells = cells.iter();
        loop {
            let col = values.len();
            if let Some((text, remaining)) = carried.get_mut(col).filter(|(_, r)| *r > 0) {
                *remaining -= 1;
                values.push(text.clone());
                continue;
            }
            let Some(cell) = cells.next() else {
                break;
            };
            let text = cell_text(cell);
            let below = span(cell, "rowspan") - 1;
            for _ in 0..span(cell, "colspan") {
                let col = values.len();
                if col >= carried.len() {
                    carried.push((String::new(), 0));
                }
                carried[col] = (text.clone(), below);
                values.push(text.clone());
            }
        }
        values.resize(width, String::new());
        grid.push(values);
    }
    grid
}

pub struct CircInteractomeSource {
    client: reqwest::Client,
    url: String,
}

impl CircInteractomeSource {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            client: build_client(&config.resolver, Trust::Mirror)?,
            url: config.sources.circinteractome_url.clone(),
        })
    }
}

#[async_trait]
impl PartnerSource for CircInteractomeSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn query(&self, entity: &str) -> Result<Option<CachePayload>> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("circular_rna_query", entity)])
            .send()
            .await
            .map_err(|e| transport_error(SOURCE_NAME, e))?;

        if !check_status(SOURCE_NAME, response.status())? {
            return Ok(None);
        }

        let body = response
            .text()
            .await
            .map_err(|e| transport_error(SOURCE_NAME, e))?;

        match parse_site_table(&body)? {
            Some(table) if !table.is_empty() => {
                log::debug!("CircInteractome: {} site rows for {}", table.rows.len(), entity);
                Ok(Some(CachePayload::Table(table)))
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prediction::{ID_COLUMN, SITE_TYPE_COLUMN};

    const PAGE: &str = r##"
<html><body>
<table border="0"><tr><td>navigation</td></tr></table>
<table border="1" bordercolor="#006699">
  <tr>
    <th rowspan="2">Row</th>
    <th colspan="3">TargetScan miRNA predictions</th>
  </tr>
  <tr>
    <th>CircRNA Mirbase ID</th>
    <th>Site Type</th>
    <th>context+ score percentile</th>
  </tr>
  <tr>
    <td>1</td>
    <td>hsa_circ_0000284&nbsp;3'UTR <b>hsa-miR-7-5p</b></td>
    <td>8mer-1a</td>
    <td>97</td>
  </tr>
  <tr>
    <td>2</td>
    <td>hsa_circ_0000284 hsa-miR-21-5p</td>
    <td>7mer-1a</td>
  </tr>
</table>
</body></html>"##;

    #[test]
    fn test_parse_two_row_header() {
        let table = parse_site_table(PAGE).unwrap().unwrap();
        assert_eq!(
            table.columns,
            vec![
                "Row_Row".to_string(),
                ID_COLUMN.to_string(),
                SITE_TYPE_COLUMN.to_string(),
                "TargetScan miRNA predictions_context+ score percentile".to_string(),
            ]
        );
        assert_eq!(table.rows.len(), 2);
        assert!(table.is_well_formed());
        assert_eq!(table.rows[1][3], "");
    }

    #[test]
    fn test_parsed_table_yields_partners() {
        let table = parse_site_table(PAGE).unwrap().unwrap();
        let partners: Vec<String> = table.partner_ids().into_iter().collect();
        assert_eq!(partners, vec!["hsa-miR-21-5p", "hsa-miR-7-5p"]);
    }

    #[test]
    fn test_rowspan_in_data_rows_is_carried_down() {
        let page = r##"
<table border="1" bordercolor="#006699">
  <tr><th rowspan="2">Row</th><th colspan="3">TargetScan miRNA predictions</th></tr>
  <tr><th>CircRNA Mirbase ID</th><th>Site Type</th><th>context+ score percentile</th></tr>
  <tr><td>1</td><td rowspan="2">hsa_circ_0000284 hsa-miR-7-5p</td><td>8mer-1a</td><td>97</td></tr>
  <tr><td>2</td><td>7mer-m8</td><td>88</td></tr>
  <tr><td>3</td><td colspan="2">merged</td><td>50</td></tr>
</table>"##;
        let table = parse_site_table(page).unwrap().unwrap();
        assert_eq!(
            table.rows,
            vec![
                vec!["1", "hsa_circ_0000284 hsa-miR-7-5p", "8mer-1a", "97"],
                vec!["2", "hsa_circ_0000284 hsa-miR-7-5p", "7mer-m8", "88"],
                vec!["3", "merged", "merged", "50"],
            ]
        );
    }

    #[test]
    fn test_page_without_result_table() {
        assert!(parse_site_table("<html><body><table border=\"0\"></table></body></html>")
            .unwrap()
            .is_none());
    }
}
