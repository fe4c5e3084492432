pub mod data_uri;
pub(crate) mod http;

#[cfg(test)]
pub(crate) mod test_support;
