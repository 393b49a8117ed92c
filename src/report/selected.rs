//! Selected-result records embedded in step output

use crate::api::SelectedResult;
use crate::common::{Error, Result};

/// Text that precedes the JSON record in a step's output
pub const SELECTED_RESULT_MARKER: &str = "Assigned selected result:";

/// Pull the selected-result record out of free-form step output
///
/// Returns `Ok(None)` when the marker is absent. The first JSON value after
/// the marker is decoded; any text following it is ignored. A marker followed
/// by anything other than a JSON object is an error.
pub fn extract_selected_result(output: &str) -> Result<Option<SelectedResult>> {
    let Some((_, rest)) = output.split_once(SELECTED_RESULT_MARKER) else {
        return Ok(None);
    };
    let rest = rest.trim();

    let mut values = serde_json::Deserializer::from_str(rest).into_iter::<SelectedResult>();
    match values.next() {
        Some(Ok(selected)) => Ok(Some(selected)),
        Some(Err(e)) => Err(Error::SelectedResultParse(e)),
        // Nothing after the marker: let the parser produce the EOF error
        None => serde_json::from_str::<SelectedResult>(rest)
            .map(Some)
            .map_err(Error::SelectedResultParse),
    }
}
