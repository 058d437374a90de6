use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    /// Neither an override nor a bundled template exists for the product.
    #[error("Unsupported database: {product}. Configure system parameter: {key}")]
    UnsupportedDatabase { product: String, key: String },

    /// A query was requested before the session resolved its template.
    #[error("Query template has not been resolved for this session")]
    Unresolved,
}
