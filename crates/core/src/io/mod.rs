//! I/O for rasters (GeoTIFF), vector layers (GeoJSON) and vector packages

mod geojson_io;
mod native;
mod package;

pub use geojson_io::{read_layer, read_layer_str, write_layer, write_layer_string};
pub use native::{
    read_geotiff, read_geotiff_from_buffer, write_geotiff, write_geotiff_to_buffer,
    GeoTiffOptions, SampleType,
};
pub use package::{read_package, write_package, PackageIndex, PackageLayer, INDEX_FILE};
