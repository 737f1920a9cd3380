pub mod converter;
pub mod error;
pub mod gpx;
pub mod kml;
pub mod measure;
pub mod options;
pub mod point;
pub mod simplify;
pub mod transform;
pub mod xml;

use geojson::FeatureCollection;
use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::converter::{Layer, PhotoLocation};
use crate::options::ConvertOptions;

/// Convert GPX string to GeoJSON, returned as a JS object.
#[wasm_bindgen(js_name = gpxToGeoJson)]
pub fn gpx_to_geojson(gpx_string: &str, options: JsValue) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let opts = parse_options(options)?;
    let fc = converter::from_gpx(gpx_string, &opts)?;
    to_js(&fc)
}

/// Convert GPX string to GeoJSON, returned as a JSON string.
#[wasm_bindgen(js_name = gpxToGeoJsonString)]
pub fn gpx_to_geojson_string(gpx_string: &str, options: JsValue) -> Result<String, JsValue> {
    console_error_panic_hook::set_once();

    let opts = parse_options(options)?;
    let fc = converter::from_gpx(gpx_string, &opts)?;
    serde_json::to_string(&fc).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Convert KML text to GeoJSON, relabeling properties when `provider` names a
/// known data provider.
#[wasm_bindgen(js_name = kmlToGeoJson)]
pub fn kml_to_geojson(kml_string: &str, provider: Option<String>) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let fc = converter::from_layer(Layer::Kml(kml_string), provider.as_deref())?;
    to_js(&fc)
}

/// Convert a KMZ archive to GeoJSON.
#[wasm_bindgen(js_name = kmzToGeoJson)]
pub fn kmz_to_geojson(archive: js_sys::Uint8Array, provider: Option<String>) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let bytes = archive.to_vec();
    let fc = converter::from_layer(Layer::Kmz(&bytes), provider.as_deref())?;
    to_js(&fc)
}

/// Point features for `{ longitude, latitude, previewUrl }` photo records.
#[wasm_bindgen(js_name = photosToGeoJson)]
pub fn photos_to_geojson(photos: JsValue, part_key: Option<String>) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let photos: Vec<PhotoLocation> =
        serde_wasm_bindgen::from_value(photos).map_err(|e| JsValue::from_str(&e.to_string()))?;
    let fc = converter::from_photos(&photos, part_key.as_deref());
    to_js(&fc)
}

fn parse_options(options: JsValue) -> Result<ConvertOptions, JsValue> {
    if options.is_undefined() || options.is_null() {
        Ok(ConvertOptions::default())
    } else {
        serde_wasm_bindgen::from_value(options).map_err(|e| JsValue::from_str(&e.to_string()))
    }
}

fn to_js(fc: &FeatureCollection) -> Result<JsValue, JsValue> {
    fc.serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| JsValue::from_str(&e.to_string()))
}
