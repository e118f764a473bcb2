//! OpenSSH `known_hosts` lookup used to verify git remotes over SSH.
//!
//! Understood host fields:
//! - plain lists `host[,host...]`, optionally `[host]:port`
//! - wildcard patterns with `*` and `?`, and `!pattern` negations
//! - hashed entries `|1|base64(salt)|base64(hmac-sha1(salt, host))`
//!
//! `@revoked` and `@cert-authority` markers are skipped.

use crate::core::error::{Result, SyncError};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use std::fs;
use std::path::Path;

const HASH_MAGIC: &str = "|1|";

type HmacSha1 = Hmac<Sha1>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostKeyStatus {
    Match,
    Mismatch,
    Unknown,
}

/// How an entry names the hosts it applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostMatcher {
    Patterns(Vec<String>),
    Hashed { salt: Vec<u8>, hash: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownHost {
    pub hosts: HostMatcher,
    pub key_type: String,
    pub key: Vec<u8>,
}

impl KnownHost {
    fn matches_host(&self, host: &str) -> bool {
        match &self.hosts {
            HostMatcher::Patterns(patterns) => {
                let mut matched = false;
                for pattern in patterns {
                    match pattern.strip_prefix('!') {
                        Some(negated) if pattern_matches(negated, host) => return false,
                        Some(_) => {}
                        None => matched |= pattern_matches(pattern, host),
                    }
                }
                matched
            }
            HostMatcher::Hashed { salt, hash } => {
                hash_host(salt, &host.to_ascii_lowercase()).is_some_and(|h| &h == hash)
            }
        }
    }
}

/// Hash `host` the way `ssh-keygen -H` does
pub fn hash_host(salt: &[u8], host: &str) -> Option<Vec<u8>> {
    let mut mac = HmacSha1::new_from_slice(salt).ok()?;
    mac.update(host.as_bytes());
    Some(mac.finalize().into_bytes().to_vec())
}

/// Strip a `[host]:port` wrapper, then glob-match case-insensitively
fn pattern_matches(pattern: &str, host: &str) -> bool {
    let bare = pattern
        .strip_prefix('[')
        .and_then(|p| p.split_once("]:"))
        .map(|(h, _port)| h)
        .unwrap_or(pattern);
    let pattern: Vec<char> = bare.to_ascii_lowercase().chars().collect();
    let host: Vec<char> = host.to_ascii_lowercase().chars().collect();
    glob(&pattern, &host)
}

fn glob(pattern: &[char], text: &[char]) -> bool {
    match pattern.split_first() {
        None => text.is_empty(),
        Some(('*', rest)) => (0..=text.len()).any(|skip| glob(rest, &text[skip..])),
        Some(('?', rest)) => !text.is_empty() && glob(rest, &text[1..]),
        Some((c, rest)) => text.first() == Some(c) && glob(rest, &text[1..]),
    }
}

fn parse_hosts(field: &str) -> Option<HostMatcher> {
    match field.strip_prefix(HASH_MAGIC) {
        Some(hashed) => {
            let (salt, hash) = hashed.split_once('|')?;
            Some(HostMatcher::Hashed {
                salt: STANDARD.decode(salt).ok()?,
                hash: STANDARD.decode(hash).ok()?,
            })
        }
        None if field.starts_with('|') => None,
        None => Some(HostMatcher::Patterns(
            field.split(',').map(str::to_string).collect(),
        )),
    }
}

pub fn parse(content: &str) -> Vec<KnownHost> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('@'))
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let hosts = parse_hosts(fields.next()?)?;
            let key_type = fields.next()?;
            let key = STANDARD.decode(fields.next()?).ok()?;
            Some(KnownHost {
                hosts,
                key_type: key_type.to_string(),
                key,
            })
        })
        .collect()
}

/// Check a raw host key blob against the entries for `host`
pub fn check(entries: &[KnownHost], host: &str, key: &[u8]) -> HostKeyStatus {
    let mut seen_host = false;
    for entry in entries.iter().filter(|e| e.matches_host(host)) {
        if entry.key == key {
            return HostKeyStatus::Match;
        }
        seen_host = true;
    }
    if seen_host {
        HostKeyStatus::Mismatch
    } else {
        HostKeyStatus::Unknown
    }
}

pub fn verify(path: &Path, host: &str, key: &[u8]) -> Result<HostKeyStatus> {
    let content = fs::read_to_string(path).map_err(|e| SyncError::io(path, e))?;
    Ok(check(&parse(&content), host, key))
}
