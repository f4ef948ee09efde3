use recordpack_core::CodecError;

use snafu::Snafu;

pub type CliResult<T> = std::result::Result<T, CliError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CliError {
    #[snafu(display(
        "Failed to read the record pack at {location}: {source}. \
         Ensure the directory was written by recordpack."
    ))]
    ReadPack {
        location: String,
        #[snafu(source(from(CodecError, Box::new)))]
        source: Box<CodecError>,
    },

    #[snafu(display("Failed to read tabular field {field} at {location}: {source}"))]
    ReadTable {
        location: String,
        field: String,
        #[snafu(source(from(CodecError, Box::new)))]
        source: Box<CodecError>,
    },

    #[snafu(display("Failed to render table output: {source}"))]
    Render { source: arrow::error::ArrowError },

    #[snafu(display("Failed to render the metadata document: {source}"))]
    RenderMetadata { source: serde_json::Error },
}
