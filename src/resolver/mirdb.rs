//! miRDB target search: miRNA → predicted target genes.

use async_trait::async_trait;
use scraper::{Html, Selector};

use super::http::{build_client, check_status, transport_error, Trust};
use super::PartnerSource;
use crate::cache::CachePayload;
use crate::config::Config;
use crate::error::{RegnetError, Result};

const SOURCE_NAME: &str = "miRDB";

pub(crate) fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| RegnetError::Parse(format!("selector {}: {:?}", css, e)))
}

/// Gene symbols from a miRDB result page
///
/// Result rows have more than four cells; the fifth holds a link whose text
/// is the gene symbol. Symbols are trimmed and uppercased, in page order.
pub fn parse_targets(html: &str) -> Result<Vec<String>> {
    let document = Html::parse_document(html);
    let row_sel = selector("tr")?;
    let cell_sel = selector("td")?;
    let link_sel = selector("a")?;

    let mut targets = Vec::new();
    for row in document.select(&row_sel) {
        let Some(cell) = row.select(&cell_sel).nth(4) else {
            continue;
        };
        if let Some(link) = cell.select(&link_sel).next() {
            let gene = link.text().collect::<String>().trim().to_uppercase();
            if !gene.is_empty() {
                targets.push(gene);
            }
        }
    }
    Ok(targets)
}

pub struct MirdbSource {
    client: reqwest::Client,
    url: String,
    species: String,
}

impl MirdbSource {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            client: build_client(&config.resolver, Trust::Mirror)?,
            url: config.sources.mirdb_url.clone(),
            species: config.sources.species.clone(),
        })
    }
}

#[async_trait]
impl PartnerSource for MirdbSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn query(&self, entity: &str) -> Result<Option<CachePayload>> {
        let form = [
            ("species", self.species.as_str()),
            ("searchBox", entity),
            ("searchType", "miRNA"),
            ("submitButton", "Go"),
        ];

        let response = self
            .client
            .post(&self.url)
            .form(&form)
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

        let targets = parse_targets(&body)?;
        log::debug!("miRDB: {} targets for {}", targets.len(), entity);

        if targets.is_empty() {
            return Ok(None);
        }
        Ok(Some(CachePayload::Partners(targets)))
    }
}
