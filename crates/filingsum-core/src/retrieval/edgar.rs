//! SEC EDGAR client
//!
//! Resolves a ticker to its CIK through the SEC ticker map (cached on disk for
//! a day), lists the company's recent filings and downloads the full
//! submission text. Every request carries the mandatory User-Agent and waits
//! out the configured delay since the previous request.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use serde::Deserialize;
use tracing::{debug, info, warn};

use super::FilingSource;
use crate::config::{Config, EdgarConfig};
use crate::error::{FilingError, Result};

const TICKER_CACHE_FILE: &str = "company_tickers.json";
const TICKER_CACHE_MAX_AGE: Duration = Duration::from_secs(24 * 3600);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Deserialize)]
struct TickerEntry {
    cik_str: u64,
    ticker: String,
}

#[derive(Debug, Deserialize)]
struct Submissions {
    filings: SubmissionFilings,
}

#[derive(Debug, Deserialize)]
struct SubmissionFilings {
    recent: RecentFilings,
}

/// Column-oriented recent filing list from the submissions API
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentFilings {
    pub accession_number: Vec<String>,
    pub filing_date: Vec<String>,
    pub form: Vec<String>,
}

/// One filing in a company's history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilingRef {
    pub accession_number: String,
    pub filing_date: String,
    pub form: String,
}

/// Newest filing of the given form type
pub fn select_latest(recent: &RecentFilings, form: &str) -> Option<FilingRef> {
    recent
        .form
        .iter()
        .zip(&recent.accession_number)
        .zip(&recent.filing_date)
        .filter(|((f, _), _)| f.eq_ignore_ascii_case(form))
        .max_by(|(_, a), (_, b)| a.cmp(b))
        .map(|((f, accession), date)| FilingRef {
            accession_number: accession.clone(),
            filing_date: date.clone(),
            form: f.clone(),
        })
}

/// Blocking EDGAR client
pub struct EdgarClient {
    agent: ureq::Agent,
    user_agent: String,
    settings: EdgarConfig,
    raw_dir: PathBuf,
    cache_dir: PathBuf,
    last_request: Mutex<Option<Instant>>,
}

impl EdgarClient {
    /// Build a client; fails without a valid User-Agent
    pub fn new(config: &Config) -> Result<Self> {
        let user_agent = config.validate_edgar()?.to_string();
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(REQUEST_TIMEOUT))
            .http_status_as_error(false)
            .build()
            .into();

        Ok(Self {
            agent,
            user_agent,
            settings: config.edgar.clone(),
            raw_dir: config.raw_filings_dir(),
            cache_dir: config.cache_dir(),
            last_request: Mutex::new(None),
        })
    }

    /// Ten-digit, zero-padded CIK for a ticker
    pub fn lookup_cik(&self, ticker: &str) -> Result<String> {
        let wanted = ticker.to_uppercase();
        if let Some(cik) = self.cached_ticker_map()?.get(&wanted) {
            return Ok(cik.clone());
        }

        info!(ticker = %wanted, "ticker not in cache, refreshing mapping");
        self.download_ticker_map()?
            .remove(&wanted)
            .ok_or_else(|| FilingError::not_found("ticker", ticker))
    }

    /// Latest filing of `form` for a company
    pub fn latest_accession(&self, cik: &str, form: &str) -> Result<FilingRef> {
        let url = format!("{}/CIK{}.json", self.settings.submissions_url, cik);
        let body = self.get_text(&url)?;
        let submissions: Submissions = serde_json::from_str(&body)
            .map_err(|e| FilingError::request("parse EDGAR submissions", e))?;

        let filing = select_latest(&submissions.filings.recent, form)
            .ok_or_else(|| FilingError::not_found(&format!("{form} filing for CIK"), cik))?;
        info!(cik, form, accession = %filing.accession_number, date = %filing.filing_date, "found filing");
        Ok(filing)
    }

    /// Download the full submission text, reusing an earlier download
    pub fn download(&self, cik: &str, accession: &str) -> Result<PathBuf> {
        let path = self.raw_dir.join(format!("{cik}_{accession}.txt"));
        if path.is_file() {
            debug!(path = %path.display(), "filing already downloaded");
            return Ok(path);
        }

        let cik_number = cik.trim_start_matches('0');
        let url = format!("{}/{}/{}.txt", self.settings.archives_url, cik_number, accession);
        fs::create_dir_all(&self.raw_dir).map_err(|e| {
            FilingError::io_operation("create directory", self.raw_dir.display(), e)
        })?;

        let mut response = self.get(&url)?;
        let temp_path = path.with_extension("txt.tmp");
        let written = File::create(&temp_path)
            .and_then(|file| {
                let mut writer = BufWriter::new(file);
                let copied = io::copy(&mut response.body_mut().as_reader(), &mut writer)?;
                writer.flush()?;
                Ok(copied)
            })
            .map_err(|e| FilingError::io_operation("download filing to", temp_path.display(), e))?;
        fs::rename(&temp_path, &path)
            .map_err(|e| FilingError::io_operation("save filing", path.display(), e))?;

        info!(path = %path.display(), bytes = written, "filing saved");
        Ok(path)
    }

    fn cached_ticker_map(&self) -> Result<HashMap<String, String>> {
        let path = self.cache_dir.join(TICKER_CACHE_FILE);
        let fresh = fs::metadata(&path)
            .and_then(|meta| meta.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
            .is_some_and(|age| age < TICKER_CACHE_MAX_AGE);

        if fresh {
            match fs::read_to_string(&path)
                .map_err(FilingError::from)
                .and_then(|content| serde_json::from_str(&content).map_err(FilingError::from))
            {
                Ok(map) => {
                    debug!(path = %path.display(), "loaded ticker mapping from cache");
                    return Ok(map);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "ignoring unreadable ticker cache"),
            }
        }
        self.download_ticker_map()
    }

    fn download_ticker_map(&self) -> Result<HashMap<String, String>> {
        let body = self.get_text(&self.settings.tickers_url)?;
        let entries: HashMap<String, TickerEntry> = serde_json::from_str(&body)
            .map_err(|e| FilingError::request("parse ticker mapping", e))?;

        let map: HashMap<String, String> = entries
            .into_values()
            .filter(|entry| entry.cik_str != 0)
            .map(|entry| (entry.ticker.to_uppercase(), format!("{:010}", entry.cik_str)))
            .collect();
        info!(tickers = map.len(), "downloaded ticker mapping");

        if let Err(e) = write_cache(&self.cache_dir, &map) {
            warn!(error = %e, "failed to cache ticker mapping");
        }
        Ok(map)
    }

    fn get_text(&self, url: &str) -> Result<String> {
        let mut response = self.get(url)?;
        response
            .body_mut()
            .read_to_string()
            .map_err(|e| FilingError::request(&format!("read {url}"), e))
    }

    fn get(&self, url: &str) -> Result<ureq::http::Response<ureq::Body>> {
        self.pace();
        debug!(url, "edgar_request");
        let response = self
            .agent
            .get(url)
            .header("User-Agent", &self.user_agent)
            .header("Accept-Encoding", "identity")
            .call()
            .map_err(|e| FilingError::request(&format!("fetch {url}"), e))?;

        match response.status().as_u16() {
            200..=299 => Ok(response),
            404 => Err(FilingError::not_found("EDGAR resource", url)),
            status => Err(FilingError::request(
                &format!("fetch {url}"),
                format!("HTTP {status}"),
            )),
        }
    }

    /// Sleep until the configured delay since the previous request has passed
    fn pace(&self) {
        let delay = Duration::from_millis(self.settings.request_delay_ms);
        let mut last = match self.last_request.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < delay {
                thread::sleep(delay - elapsed);
            }
        }
        *last = Some(Instant::now());
    }
}

impl FilingSource for EdgarClient {
    fn latest_filing(&self, entity: &str, category: &str) -> Result<PathBuf> {
        let cik = self.lookup_cik(entity)?;
        let filing = self.latest_accession(&cik, category)?;
        self.download(&cik, &filing.accession_number)
    }
}

fn write_cache(dir: &Path, map: &HashMap<String, String>) -> Result<()> {
    fs::create_dir_all(dir)?;
    let path = dir.join(TICKER_CACHE_FILE);
    let temp_path = path.with_extension("json.tmp");
    fs::write(&temp_path, serde_json::to_vec(map)?)?;
    fs::rename(&temp_path, &path)?;
    Ok(())
}
