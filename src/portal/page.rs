use super::{Position, Snapshot};
use crate::error::PageError;
use scraper::{Html, Selector};
use serde::de::DeserializeOwned;

const BUS_LOCATION_INPUT: &str = "MainContent_NestContent_hfBusLocation";
const STOP_LOCATIONS_INPUT: &str = "MainContent_NestContent_hfBusStopLocations";

/// Pull bus and stop positions out of the "Where's My Bus" page.
///
/// The portal renders both as JSON inside hidden `<input>` values. Only the
/// first listed stop is used.
pub fn parse_tracker_page(html: &str) -> Result<Snapshot, PageError> {
    let document = Html::parse_document(html);

    let bus: Position = decode_input(&document, BUS_LOCATION_INPUT)?;
    let stops: Vec<Position> = decode_input(&document, STOP_LOCATIONS_INPUT)?;
    let stop = stops.into_iter().next().ok_or(PageError::NoStops)?;

    Ok(Snapshot { bus, stop })
}

fn hidden_value<'a>(document: &'a Html, id: &'static str) -> Result<&'a str, PageError> {
    let selector = Selector::parse(&format!("input#{id}"))
        .map_err(|_| PageError::MissingField(id))?;

    document
        .select(&selector)
        .next()
        .and_then(|input| input.value().attr("value"))
        .ok_or(PageError::MissingField(id))
}

fn decode_input<T: DeserializeOwned>(document: &Html, id: &'static str) -> Result<T, PageError> {
    let raw = hidden_value(document, id)?;
    serde_json::from_str(raw).map_err(|source| PageError::InvalidJson { field: id, source })
}
