use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use reqwest::Url;
use reqwest::blocking::{Client, ClientBuilder};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::PipelineError;
use crate::fs_util::{open_input, plain_or_gz};

/// Read access to a taxonomy database. Implementations may fail freely;
/// callers in [`crate::classify`] turn every failure into "unresolved".
pub trait TaxonomyClient: Send + Sync {
    fn name_to_taxid(&self, name: &str) -> Result<Option<u32>, PipelineError>;
    fn rank(&self, taxid: u32) -> Result<Option<String>, PipelineError>;
    fn scientific_name(&self, taxid: u32) -> Result<Option<String>, PipelineError>;
    /// Ancestors of `taxid` ordered from the root down to `taxid` itself.
    fn lineage(&self, taxid: u32) -> Result<Vec<u32>, PipelineError>;
}

impl<T: TaxonomyClient + ?Sized> TaxonomyClient for Box<T> {
    fn name_to_taxid(&self, name: &str) -> Result<Option<u32>, PipelineError> {
        (**self).name_to_taxid(name)
    }

    fn rank(&self, taxid: u32) -> Result<Option<String>, PipelineError> {
        (**self).rank(taxid)
    }

    fn scientific_name(&self, taxid: u32) -> Result<Option<String>, PipelineError> {
        (**self).scientific_name(taxid)
    }

    fn lineage(&self, taxid: u32) -> Result<Vec<u32>, PipelineError> {
        (**self).lineage(taxid)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineTaxonomy;

impl TaxonomyClient for OfflineTaxonomy {
    fn name_to_taxid(&self, _name: &str) -> Result<Option<u32>, PipelineError> {
        Ok(None)
    }

    fn rank(&self, _taxid: u32) -> Result<Option<String>, PipelineError> {
        Ok(None)
    }

    fn scientific_name(&self, _taxid: u32) -> Result<Option<String>, PipelineError> {
        Ok(None)
    }

    fn lineage(&self, taxid: u32) -> Result<Vec<u32>, PipelineError> {
        Err(PipelineError::Taxonomy(format!(
            "offline: no lineage for taxid {taxid}"
        )))
    }
}

const ROOT_TAXID: u32 = 1;
const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone)]
struct TaxdumpNode {
    parent: u32,
    rank: String,
}

#[derive(Debug, Default)]
pub struct TaxdumpTaxonomy {
    nodes: HashMap<u32, TaxdumpNode>,
    scientific_names: HashMap<u32, String>,
    by_scientific_name: HashMap<String, u32>,
    by_other_name: HashMap<String, u32>,
}

impl TaxdumpTaxonomy {
    pub fn load(dir: &Path) -> Result<Self, PipelineError> {
        let nodes_path = plain_or_gz(&dir.join("nodes.dmp"));
        let names_path = plain_or_gz(&dir.join("names.dmp"));
        info!(dir = %dir.display(), "loading NCBI taxdump");
        let taxonomy = Self::from_readers(open_input(&nodes_path)?, open_input(&names_path)?)?;
        info!(nodes = taxonomy.nodes.len(), "taxdump loaded");
        Ok(taxonomy)
    }

    pub fn from_readers(nodes: impl BufRead, names: impl BufRead) -> Result<Self, PipelineError> {
        let mut taxonomy = Self::default();

        for line in nodes.lines() {
            let line = line.map_err(|err| PipelineError::Filesystem(err.to_string()))?;
            let fields = split_dmp_line(&line);
            let (Some(taxid), Some(parent), Some(rank)) = (
                fields.first().and_then(|v| v.parse::<u32>().ok()),
                fields.get(1).and_then(|v| v.parse::<u32>().ok()),
                fields.get(2),
            ) else {
                if !line.trim().is_empty() {
                    debug!(line = %line, "skipping malformed nodes.dmp line");
                }
                continue;
            };
            taxonomy.nodes.insert(
                taxid,
                TaxdumpNode {
                    parent,
                    rank: rank.to_string(),
                },
            );
        }

        for line in names.lines() {
            let line = line.map_err(|err| PipelineError::Filesystem(err.to_string()))?;
            let fields = split_dmp_line(&line);
            let (Some(taxid), Some(name), Some(class)) = (
                fields.first().and_then(|v| v.parse::<u32>().ok()),
                fields.get(1),
                fields.get(3),
            ) else {
                continue;
            };
            let key = name.to_lowercase();
            if *class == "scientific name" {
                taxonomy.scientific_names.insert(taxid, name.to_string());
                taxonomy.by_scientific_name.entry(key).or_insert(taxid);
            } else {
                taxonomy.by_other_name.entry(key).or_insert(taxid);
            }
        }

        Ok(taxonomy)
    }
}

fn split_dmp_line(line: &str) -> Vec<&str> {
    line.trim_end_matches(['\n', '\r'])
        .trim_end_matches("\t|")
        .split("\t|\t")
        .map(str::trim)
        .collect()
}

impl TaxonomyClient for TaxdumpTaxonomy {
    fn name_to_taxid(&self, name: &str) -> Result<Option<u32>, PipelineError> {
        let key = name.trim().to_lowercase();
        Ok(self
            .by_scientific_name
            .get(&key)
            .or_else(|| self.by_other_name.get(&key))
            .copied())
    }

    fn rank(&self, taxid: u32) -> Result<Option<String>, PipelineError> {
        Ok(self.nodes.get(&taxid).map(|node| node.rank.clone()))
    }

    fn scientific_name(&self, taxid: u32) -> Result<Option<String>, PipelineError> {
        Ok(self.scientific_names.get(&taxid).cloned())
    }

    fn lineage(&self, taxid: u32) -> Result<Vec<u32>, PipelineError> {
        if !self.nodes.contains_key(&taxid) {
            return Err(PipelineError::Taxonomy(format!("unknown taxid {taxid}")));
        }
        let mut path = vec![taxid];
        let mut current = taxid;
        while current != ROOT_TAXID {
            let Some(node) = self.nodes.get(&current) else {
                break;
            };
            if node.parent == current || path.len() > MAX_DEPTH {
                break;
            }
            current = node.parent;
            path.push(current);
        }
        path.reverse();
        Ok(path)
    }
}

#[derive(Debug, Deserialize)]
struct TaxonomyResponse {
    #[serde(default)]
    taxonomy_nodes: Vec<TaxonomyNodeEntry>,
}

#[derive(Debug, Deserialize)]
struct TaxonomyNodeEntry {
    #[serde(default)]
    taxonomy: Option<DatasetsTaxon>,
}

#[derive(Debug, Clone, Deserialize)]
struct DatasetsTaxon {
    tax_id: u32,
    #[serde(default)]
    organism_name: Option<String>,
    #[serde(default)]
    rank: Option<String>,
    #[serde(default)]
    lineage: Vec<u32>,
}

pub struct DatasetsTaxonomyClient {
    client: Client,
    base_url: String,
    taxa: Mutex<HashMap<u32, DatasetsTaxon>>,
}

impl DatasetsTaxonomyClient {
    pub fn new() -> Result<Self, PipelineError> {
        Self::from_builder(Client::builder())
    }

    fn from_builder(builder: ClientBuilder) -> Result<Self, PipelineError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("genpept-fasta/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| PipelineError::NcbiHttp(err.to_string()))?,
        );
        headers.insert("X-Datasets-Client", HeaderValue::from_static("genpept-fasta"));

        if let Ok(api_key) = std::env::var("NCBI_API_KEY") {
            if !api_key.trim().is_empty() {
                headers.insert(
                    "api-key",
                    HeaderValue::from_str(api_key.trim())
                        .map_err(|err| PipelineError::NcbiHttp(err.to_string()))?,
                );
            }
        }

        let client = builder
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| PipelineError::NcbiHttp(err.to_string()))?;

        Ok(Self {
            client,
            base_url: "https://api.ncbi.nlm.nih.gov/datasets/v2".to_string(),
            taxa: Mutex::new(HashMap::new()),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn taxon_url(&self, taxon: &str) -> Result<Url, PipelineError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|err| PipelineError::NcbiHttp(format!("{}: {err}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|_| PipelineError::NcbiHttp(format!("{} cannot be a base", self.base_url)))?
            .extend(["taxonomy", "taxon", taxon]);
        Ok(url)
    }

    fn query(&self, taxon: &str) -> Result<Option<DatasetsTaxon>, PipelineError> {
        let url = self.taxon_url(taxon)?;
        let response = self.send_with_retries(|| self.client.get(url.clone()))?;
        let status = response.status();
        if status.as_u16() == 404 {
            return Ok(None);
        }
        if !status.is_success() {
            let message = response
                .text()
                .unwrap_or_else(|_| "NCBI request failed".to_string());
            return Err(PipelineError::NcbiStatus {
                status: status.as_u16(),
                message,
            });
        }
        let body: TaxonomyResponse = response
            .json()
            .map_err(|err| PipelineError::NcbiHttp(err.to_string()))?;
        let taxon = body
            .taxonomy_nodes
            .into_iter()
            .find_map(|entry| entry.taxonomy);
        if let Some(taxon) = &taxon {
            self.remember(taxon.clone());
        }
        Ok(taxon)
    }

    fn remember(&self, taxon: DatasetsTaxon) {
        if let Ok(mut taxa) = self.taxa.lock() {
            taxa.insert(taxon.tax_id, taxon);
        }
    }

    fn taxon(&self, taxid: u32) -> Result<Option<DatasetsTaxon>, PipelineError> {
        if let Some(taxon) = self.taxa.lock().ok().and_then(|taxa| taxa.get(&taxid).cloned()) {
            return Ok(Some(taxon));
        }
        self.query(&taxid.to_string())
    }

    fn send_with_retries<F>(&self, mut make_req: F) -> Result<reqwest::blocking::Response, PipelineError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            match make_req().send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        thread::sleep(Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1)));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        thread::sleep(Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1)));
                        attempt += 1;
                        continue;
                    }
                    return Err(PipelineError::NcbiHttp(err.to_string()));
                }
            }
        }
    }
}

impl TaxonomyClient for DatasetsTaxonomyClient {
    fn name_to_taxid(&self, name: &str) -> Result<Option<u32>, PipelineError> {
        let name = name.trim();
        // The endpoint reads a numeric query as a taxid, not a name.
        if name.is_empty() || name.parse::<u32>().is_ok() {
            return Ok(None);
        }
        // Synonyms and renamed species come back under their current
        // scientific name.
        Ok(self.query(name)?.map(|taxon| taxon.tax_id))
    }

    fn rank(&self, taxid: u32) -> Result<Option<String>, PipelineError> {
        Ok(self
            .taxon(taxid)?
            .and_then(|taxon| taxon.rank)
            .map(|rank| rank.to_lowercase().replace('_', " ")))
    }

    fn scientific_name(&self, taxid: u32) -> Result<Option<String>, PipelineError> {
        Ok(self.taxon(taxid)?.and_then(|taxon| taxon.organism_name))
    }

    fn lineage(&self, taxid: u32) -> Result<Vec<u32>, PipelineError> {
        let taxon = self
            .taxon(taxid)?
            .ok_or_else(|| PipelineError::Taxonomy(format!("unknown taxid {taxid}")))?;
        let mut path = taxon.lineage;
        if path.last() != Some(&taxid) {
            path.push(taxid);
        }
        Ok(path)
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
