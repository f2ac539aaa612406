//! `Location` header parsing and endpoint merging.
//!
//! A redirect target may be partial (`/new`, `//mirror/new`, `next?page=2`).
//! Only the components it carries replace those of the current endpoint;
//! everything else, the query string included, is inherited.

use url::{ParseError, Url};

use crate::{HttpError, Result};

/// Base used to validate relative references before the real endpoint is known.
const VALIDATION_BASE: &str = "http://location.invalid/";

/// A parsed `Location` value. Fragments are discarded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Location {
    raw: String,
    target: Target,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Target {
    Absolute(Url),
    /// Resolved against the current endpoint at merge time; only the flagged
    /// components are copied over.
    Relative {
        host: Option<String>,
        has_path: bool,
        has_query: bool,
    },
}

impl Location {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(invalid(raw, "empty location"));
        }
        let target = match Url::parse(trimmed) {
            Ok(url) if url.cannot_be_a_base() => {
                return Err(invalid(raw, "location has no hierarchical path"));
            }
            Ok(url) => Target::Absolute(url),
            Err(ParseError::RelativeUrlWithoutBase) => relative_target(trimmed)?,
            Err(err) => return Err(invalid(raw, &err.to_string())),
        };
        Ok(Self {
            raw: trimmed.to_owned(),
            target,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Host named by the location, for absolute and `//host/...` forms.
    pub fn host(&self) -> Option<&str> {
        match &self.target {
            Target::Absolute(url) => url.host_str(),
            Target::Relative { host, .. } => host.as_deref(),
        }
    }

    /// Whether this location names exactly `current`.
    ///
    /// Only absolute locations can match; a partial one always describes a move.
    pub fn is_same_target(&self, current: &Url) -> bool {
        match &self.target {
            Target::Absolute(url) => url == current,
            Target::Relative { .. } => false,
        }
    }

    /// Applies the components present here onto `current`.
    ///
    /// Path is replaced (a relative path resolves against the current one);
    /// scheme, userinfo and host only when given; port only when it differs
    /// from the effective current port; query only when given.
    pub fn merge_into(&self, current: &Url) -> Result<Url> {
        match &self.target {
            Target::Absolute(url) => self.merge_absolute(url, current),
            Target::Relative {
                host,
                has_path,
                has_query,
            } => {
                let resolved = current
                    .join(&self.raw)
                    .map_err(|err| invalid(&self.raw, &err.to_string()))?;
                let mut merged = current.clone();
                if host.is_some() {
                    self.copy_authority(&resolved, resolved.port(), &mut merged)?;
                }
                if *has_path {
                    merged.set_path(resolved.path());
                }
                if *has_query {
                    merged.set_query(resolved.query());
                }
                Ok(merged)
            }
        }
    }

    fn merge_absolute(&self, location: &Url, current: &Url) -> Result<Url> {
        let mut merged = current.clone();
        merged.set_path(location.path());
        merged.set_scheme(location.scheme()).map_err(|()| {
            invalid(
                &self.raw,
                &format!("cannot switch scheme to '{}'", location.scheme()),
            )
        })?;
        self.copy_authority(location, location.port_or_known_default(), &mut merged)?;
        if location.query().is_some() {
            merged.set_query(location.query());
        }
        Ok(merged)
    }

    fn copy_authority(&self, from: &Url, port: Option<u16>, merged: &mut Url) -> Result<()> {
        merged
            .set_host(from.host_str())
            .map_err(|err| invalid(&self.raw, &err.to_string()))?;
        if !from.username().is_empty() {
            merged
                .set_username(from.username())
                .and_then(|()| merged.set_password(from.password()))
                .map_err(|()| invalid(&self.raw, "cannot set userinfo"))?;
        }
        if let Some(port) = port {
            if merged.port_or_known_default() != Some(port) {
                merged
                    .set_port(Some(port))
                    .map_err(|()| invalid(&self.raw, "cannot set port"))?;
            }
        }
        Ok(())
    }
}

/// Validates a relative reference and records which components it carries.
fn relative_target(raw: &str) -> Result<Target> {
    let resolved = Url::parse(VALIDATION_BASE)
        .and_then(|base| base.join(raw))
        .map_err(|err| invalid(raw, &err.to_string()))?;

    let reference = raw.split_once('#').map_or(raw, |(head, _)| head);
    let (before_query, has_query) = match reference.split_once('?') {
        Some((head, _)) => (head, true),
        None => (reference, false),
    };
    let network_path = before_query.starts_with("//");

    Ok(Target::Relative {
        host: network_path
            .then(|| resolved.host_str().map(str::to_owned))
            .flatten(),
        has_path: network_path || !before_query.is_empty(),
        has_query,
    })
}

fn invalid(location: &str, reason: &str) -> HttpError {
    HttpError::InvalidLocation {
        location: location.to_owned(),
        reason: reason.to_owned(),
    }
}
