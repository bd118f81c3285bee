//! File-type derivation for download records.
//!
//! A download record carries several unreliable signals about what kind of
//! file it is. Resolution walks them in a strict order, most precise first:
//!
//! 1. Suffix of the suggested filename.
//! 2. Suffix of the final resolved URL's path segment.
//! 3. Suffix of the original request URL's path segment.
//! 4. Subtype of the declared MIME type (`type/subtype` → `.subtype`).
//!
//! A signal that yields nothing, or yields an extension the supplied
//! membership predicate does not admit, falls through to the next one.
//! A filename or URL with no `.` is not an error; that step just yields
//! nothing.

use url::Url;

use crate::intercept::DownloadRecord;

/// Longest suffix (including the dot) still treated as a file extension.
/// Anything longer is a version string or an opaque token, not a type.
const MAX_EXTENSION_LEN: usize = 12;

/// Resolves the normalized extension for a record, gated by `is_supported`.
///
/// Returns the first candidate in the fallback order that is both non-empty
/// and admitted by the predicate, or `None` when every signal is exhausted.
#[must_use]
pub fn resolve_file_type<F>(record: &DownloadRecord, is_supported: F) -> Option<String>
where
    F: Fn(&str) -> bool,
{
    candidates(record)
        .into_iter()
        .find(|candidate| is_supported(candidate))
}

/// All candidate extensions for a record, in resolution order.
///
/// Exposed separately so hosts can log why a record resolved the way it did.
#[must_use]
pub fn candidates(record: &DownloadRecord) -> Vec<String> {
    let mut out = Vec::new();
    let mut push = |candidate: Option<String>| {
        if let Some(ext) = candidate
            && !out.contains(&ext)
        {
            out.push(ext);
        }
    };

    push(record.filename.as_deref().and_then(extension_of_name));
    push(record.final_url.as_deref().and_then(extension_from_url));
    push(extension_from_url(&record.url));
    push(record.mime.as_deref().and_then(extension_from_mime));
    out
}

/// Extracts a lowercase dot-prefixed extension from a bare filename.
pub(crate) fn extension_of_name(name: &str) -> Option<String> {
    let dot_index = name.rfind('.')?;
    let ext = &name[dot_index..];
    if ext.len() <= 1 || ext.len() > MAX_EXTENSION_LEN {
        return None;
    }
    Some(ext.to_lowercase())
}

/// Extracts an extension from a URL's last path segment.
///
/// Query strings and fragments never contribute: only the path is consulted.
/// The segment is percent-decoded first so `report%2Efinal.PDF` still yields
/// `.pdf`.
pub(crate) fn extension_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let last_segment = parsed.path_segments()?.next_back()?;
    let decoded = urlencoding::decode(last_segment).ok()?;
    extension_of_name(&decoded)
}

/// Derives an extension from a declared MIME type: `video/mp4` → `.mp4`.
///
/// Parameters after `;` are discarded. The subtype is the least precise
/// signal, but also the only one that is almost always present.
pub(crate) fn extension_from_mime(mime: &str) -> Option<String> {
    let essence = mime.split(';').next().unwrap_or("").trim();
    let subtype = essence.split('/').nth(1)?.trim();
    if subtype.is_empty() || subtype.len() >= MAX_EXTENSION_LEN {
        return None;
    }
    Some(format!(".{}", subtype.to_lowercase()))
}
