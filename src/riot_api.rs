use anyhow::{Result, anyhow, bail};
use log::{debug, warn};
use reqwest::StatusCode;
use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, RETRY_AFTER};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::VecDeque;
use std::env;
use std::sync::{Mutex, OnceLock};
use std::thread::sleep;
use std::time::{Duration, Instant};

pub const DEFAULT_MAX_REQS_PER_2MIN: usize = 100;
pub const DEFAULT_MAX_REQS_PER_SEC: usize = 20;
static GLOBAL_RATE_LIMITER: OnceLock<Mutex<RateLimiter>> = OnceLock::new();

#[derive(Deserialize)]
pub struct AccountResponse {
    pub puuid: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeagueEntry {
    #[serde(default)]
    pub puuid: Option<String>,
    #[serde(default)]
    pub summoner_id: Option<String>,
    #[serde(default)]
    pub league_points: i64,
}

#[derive(Deserialize)]
struct LeagueList {
    #[serde(default)]
    entries: Vec<LeagueEntry>,
}

#[derive(Deserialize)]
struct SummonerResponse {
    puuid: String,
}

/// Regional cluster serving match-v5 and account-v1 for a platform.
pub fn regional_host(platform: &str) -> Result<&'static str> {
    let region = match platform.to_lowercase().as_str() {
        "br1" | "na1" | "la1" | "la2" => "americas",
        "kr" | "jp1" => "asia",
        "euw1" | "eun1" | "tr1" | "ru" | "me1" => "europe",
        "oc1" | "ph2" | "sg2" | "th2" | "tw2" | "vn2" => "sea",
        other => bail!("Unknown platform '{}'", other),
    };
    Ok(region)
}

/// Splits `Name#TAG`; both halves must be non-empty.
pub fn parse_riot_id(riot_id: &str) -> Option<(&str, &str)> {
    let (name, tag) = riot_id.split_once('#')?;
    let (name, tag) = (name.trim(), tag.trim());
    if name.is_empty() || tag.is_empty() {
        return None;
    }
    Some((name, tag))
}

fn build_headers() -> Result<HeaderMap> {
    let api_key = env::var("RIOT_API_KEY").map_err(|_| anyhow!("RIOT_API_KEY is not set"))?;

    let mut headers = HeaderMap::new();
    headers.insert("X-Riot-Token", HeaderValue::from_str(&api_key)?);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    Ok(headers)
}

pub struct RiotClient {
    client: Client,
    headers: HeaderMap,
    platform: String,
    region: &'static str,
}

impl RiotClient {
    pub fn new(platform: &str) -> Result<Self> {
        global_rate_limiter();

        Ok(Self {
            client: Client::new(),
            headers: build_headers()?,
            platform: platform.to_lowercase(),
            region: regional_host(platform)?,
        })
    }

    pub fn new_with_max(platform: &str, max_reqs_per_2min: usize) -> Result<Self> {
        {
            let limiter = global_rate_limiter();
            let mut guard = limiter
                .lock()
                .expect("Rate limiter mutex poisoned while setting max");
            guard.set_max_reqs_per_2min(max_reqs_per_2min);
        }

        Self::new(platform)
    }

    fn regional_url(&self, segments: &[&str]) -> Result<Url> {
        build_url(self.region, segments)
    }

    fn platform_url(&self, segments: &[&str]) -> Result<Url> {
        build_url(&self.platform, segments)
    }

    pub fn get_match_ids_by_puuid(&self, puuid: &str, count: usize) -> Result<Vec<String>> {
        let mut url = self.regional_url(&["lol", "match", "v5", "matches", "by-puuid", puuid, "ids"])?;
        url.query_pairs_mut()
            .append_pair("start", "0")
            .append_pair("count", &count.to_string());

        self.get_json(url)
    }

    pub fn get_match_json(&self, match_id: &str) -> Result<Value> {
        let url = self.regional_url(&["lol", "match", "v5", "matches", match_id])?;
        self.get_json(url)
    }

    pub fn get_timeline_json(&self, match_id: &str) -> Result<Value> {
        let url = self.regional_url(&["lol", "match", "v5", "matches", match_id, "timeline"])?;
        self.get_json(url)
    }

    pub fn get_account_by_riot_id(&self, game_name: &str, tag_line: &str) -> Result<AccountResponse> {
        // account-v1 has no SEA cluster.
        let region = if self.region == "sea" { "asia" } else { self.region };
        let url = build_url(
            region,
            &["riot", "account", "v1", "accounts", "by-riot-id", game_name, tag_line],
        )?;
        self.get_json(url)
    }

    pub fn get_master_league(&self, queue: &str) -> Result<Vec<LeagueEntry>> {
        let url = self.platform_url(&["lol", "league", "v4", "masterleagues", "by-queue", queue])?;
        let list: LeagueList = self.get_json(url)?;
        Ok(list.entries)
    }

    pub fn get_puuid_by_summoner_id(&self, summoner_id: &str) -> Result<String> {
        let url = self.platform_url(&["lol", "summoner", "v4", "summoners", summoner_id])?;
        let summoner: SummonerResponse = self.get_json(url)?;
        Ok(summoner.puuid)
    }

    fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = self.request_with_retry(&url)?;
        Ok(response.json()?)
    }

    fn request_with_retry(&self, url: &Url) -> Result<reqwest::blocking::Response> {
        const MAX_ATTEMPTS: usize = 3;
        let mut attempt = 0;

        loop {
            attempt += 1;

            wait_global_rate_limit();

            debug!("GET {}", url);
            let response = self
                .client
                .get(url.clone())
                .headers(self.headers.clone())
                .send()?;

            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                if attempt >= MAX_ATTEMPTS {
                    bail!("Too many requests for URL {}", url);
                }

                let wait = parse_retry_after(&response).unwrap_or(Duration::from_secs(10));
                warn!("Rate limited, retrying {} in {}s", url, wait.as_secs());
                sleep(wait);
                continue;
            }

            if !response.status().is_success() {
                bail!("Request to {} failed with status {}", url, response.status());
            }

            return Ok(response);
        }
    }
}

fn build_url(host: &str, segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(&format!("https://{}.api.riotgames.com", host))?;
    url.path_segments_mut()
        .map_err(|_| anyhow!("Cannot build a path on {}", host))?
        .extend(segments);
    Ok(url)
}

pub struct RateLimiter {
    max_reqs_per_2min: usize,
    max_reqs_per_sec: usize,
    timestamps_2min: VecDeque<Instant>,
    timestamps_1s: VecDeque<Instant>,
}

impl RateLimiter {
    pub fn new(max_reqs_per_2min: usize, max_reqs_per_sec: usize) -> Self {
        Self {
            max_reqs_per_2min,
            max_reqs_per_sec,
            timestamps_2min: VecDeque::new(),
            timestamps_1s: VecDeque::new(),
        }
    }

    pub fn set_max_reqs_per_2min(&mut self, max_reqs_per_2min: usize) {
        self.max_reqs_per_2min = max_reqs_per_2min;
    }

    /// How long the next request has to wait, if at all.
    fn delay(&mut self, now: Instant) -> Option<Duration> {
        self.prune(now);

        let windows = [
            (&self.timestamps_1s, self.max_reqs_per_sec, Duration::from_secs(1)),
            (&self.timestamps_2min, self.max_reqs_per_2min, Duration::from_secs(120)),
        ];

        for (timestamps, max, window) in windows {
            if timestamps.len() < max {
                continue;
            }
            if let Some(oldest) = timestamps.front() {
                let elapsed = now.duration_since(*oldest);
                if elapsed < window {
                    return Some(window - elapsed);
                }
            }
        }

        None
    }

    fn record(&mut self, at: Instant) {
        self.timestamps_1s.push_back(at);
        self.timestamps_2min.push_back(at);
    }

    pub fn wait(&mut self) {
        while let Some(duration) = self.delay(Instant::now()) {
            sleep(duration);
        }
        self.record(Instant::now());
    }

    fn prune(&mut self, now: Instant) {
        while let Some(front) = self.timestamps_1s.front() {
            if now.duration_since(*front) > Duration::from_secs(1) {
                self.timestamps_1s.pop_front();
            } else {
                break;
            }
        }

        while let Some(front) = self.timestamps_2min.front() {
            if now.duration_since(*front) > Duration::from_secs(120) {
                self.timestamps_2min.pop_front();
            } else {
                break;
            }
        }
    }
}

fn global_rate_limiter() -> &'static Mutex<RateLimiter> {
    GLOBAL_RATE_LIMITER.get_or_init(|| {
        Mutex::new(RateLimiter::new(
            DEFAULT_MAX_REQS_PER_2MIN,
            DEFAULT_MAX_REQS_PER_SEC,
        ))
    })
}

fn wait_global_rate_limit() {
    let limiter = global_rate_limiter();
    let mut guard = limiter
        .lock()
        .expect("Rate limiter mutex poisoned while waiting");
    guard.wait();
}

fn parse_retry_after(response: &reqwest::blocking::Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_routing() {
        assert_eq!(regional_host("br1").unwrap(), "americas");
        assert_eq!(regional_host("KR").unwrap(), "asia");
        assert_eq!(regional_host("euw1").unwrap(), "europe");
        assert_eq!(regional_host("vn2").unwrap(), "sea");
        assert!(regional_host("moon1").is_err());
    }

    #[test]
    fn riot_id_parsing() {
        assert_eq!(parse_riot_id("han dao#EGC"), Some(("han dao", "EGC")));
        assert_eq!(parse_riot_id("Gatovisck#愛憎の影"), Some(("Gatovisck", "愛憎の影")));
        assert_eq!(parse_riot_id("NoTag"), None);
        assert_eq!(parse_riot_id("#EGC"), None);
    }

    #[test]
    fn url_segments_are_encoded() {
        let url = build_url(
            "americas",
            &["riot", "account", "v1", "accounts", "by-riot-id", "han dao", "EGC"],
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://americas.api.riotgames.com/riot/account/v1/accounts/by-riot-id/han%20dao/EGC"
        );
    }

    #[test]
    fn limiter_delays_when_window_is_full() {
        let mut limiter = RateLimiter::new(100, 2);
        let start = Instant::now();
        assert_eq!(limiter.delay(start), None);
        limiter.record(start);
        limiter.record(start);

        let delay = limiter.delay(start).unwrap();
        assert!(delay <= Duration::from_secs(1));

        let later = start + Duration::from_millis(1500);
        assert_eq!(limiter.delay(later), None);
    }

    #[test]
    fn limiter_two_minute_window() {
        let mut limiter = RateLimiter::new(1, 20);
        let start = Instant::now();
        limiter.record(start);
        let delay = limiter.delay(start + Duration::from_secs(5)).unwrap();
        assert_eq!(delay, Duration::from_secs(115));
    }
}
