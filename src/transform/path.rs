//! Sed-like path rewriting, grounded on the reference gateway's regex-backed
//! route matching (`utils/route_matcher.rs`) but generalized to an explicit
//! rewrite expression instead of a fixed `{param}` syntax.

use crate::error::RouterError;
use crate::models::route::Route;
use regex::Regex;

/// A code point that cannot appear in a valid path, used to protect escaped
/// slashes from the expression-splitting pass.
const SENTINEL: char = '\u{E000}';

/// Applies a `s/<from>/<to>[/g]` expression to `path`.
///
/// Slashes inside `<from>` or `<to>` are escaped as `\/`. The algorithm
/// replaces each escaped slash with a private-use sentinel, splits the
/// expression on `/`, restores slashes inside the recovered `from`/`to`
/// segments, then compiles `from` as a regex — applied globally iff the
/// optional fourth segment is exactly `g`.
pub fn transform_path(path: &str, expr: &str) -> Result<String, RouterError> {
    let protected = expr.replace("\\/", &SENTINEL.to_string());
    let segments: Vec<&str> = protected.split('/').collect();

    // segments[0] is the literal "s" marker; from/to are segments[1]/[2].
    if segments.len() < 3 {
        return Err(RouterError::MalformedPathExpression(expr.to_string()));
    }

    let from = segments[1].replace(SENTINEL, "/");
    let to = segments[2].replace(SENTINEL, "/");
    let global = segments.get(3) == Some(&"g");

    let re = Regex::new(&from)
        .map_err(|e| RouterError::MalformedPathExpression(format!("{expr}: {e}")))?;

    Ok(if global {
        re.replace_all(path, to.as_str()).into_owned()
    } else {
        re.replace(path, to.as_str()).into_owned()
    })
}

/// Resolves the outbound path for a route (spec §4.1):
///
/// - `path_transform` set → apply [`transform_path`] to the inbound path.
/// - else `path` set → the literal route path replaces the inbound path.
/// - else → the inbound path is used unchanged.
pub fn effective_path(route: &Route, inbound_path: &str) -> Result<String, RouterError> {
    if let Some(expr) = &route.path_transform {
        return transform_path(inbound_path, expr);
    }
    if let Some(path) = &route.path {
        return Ok(path.clone());
    }
    Ok(inbound_path.to_string())
}
