use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    path::{Path, PathBuf},
};

use base64::{engine::general_purpose::STANDARD, Engine};

#[derive(Debug)]
pub enum SchemeError {
    Unsupported(String),
    BadDataUri,
}

impl Display for SchemeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SchemeError::Unsupported(scheme) => write!(f, "Unsupported scheme {}", scheme),
            SchemeError::BadDataUri => write!(f, "Bad data URI"),
        }
    }
}

impl Error for SchemeError {}

#[derive(Debug, PartialEq)]
pub(crate) enum Scheme<'a> {
    // Data uri with optional mime type
    Data(Option<&'a str>, Vec<u8>),
    // Relative path
    Relative(&'a str),
    // Absolute path
    Absolute(&'a str),
}

fn strip_prefix_ignore_case<'a>(uri: &'a str, prefix: &str) -> Option<&'a str> {
    let head = uri.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &uri[prefix.len()..])
}

impl<'a> TryFrom<&'a str> for Scheme<'a> {
    type Error = SchemeError;

    fn try_from(uri: &'a str) -> Result<Self, Self::Error> {
        if let Some(content) = strip_prefix_ignore_case(uri, "data:") {
            // Data URI: rfc2397
            let Some((param, value)) = content.split_once(',') else {
                return Err(SchemeError::BadDataUri);
            };
            match param.split_once(';') {
                Some((mime, encoding)) if encoding.eq_ignore_ascii_case("base64") => {
                    let data = STANDARD
                        .decode(value)
                        .map_err(|_| SchemeError::BadDataUri)?;
                    let mime = (!mime.is_empty()).then_some(mime);
                    Ok(Scheme::Data(mime, data))
                }
                Some(_) => Err(SchemeError::BadDataUri),
                // Plain data carries no useful mime for images and buffers,
                // content is guessed later.
                None => Ok(Scheme::Data(None, Vec::from(value.as_bytes()))),
            }
        } else if let Some(path) = strip_prefix_ignore_case(uri, "file://") {
            Ok(Scheme::Absolute(path))
        } else if let Some(path) = strip_prefix_ignore_case(uri, "file:") {
            Ok(Scheme::Absolute(path))
        } else if let Some((scheme, _)) = uri.split_once("://") {
            Err(SchemeError::Unsupported(scheme.to_string()))
        } else {
            Ok(Scheme::Relative(uri))
        }
    }
}

impl<'a> Scheme<'a> {
    /// The file this URI points to, if any. Relative paths need a base
    /// directory to resolve against.
    pub(crate) fn file_path(&self, base: Option<&Path>) -> Option<PathBuf> {
        match self {
            Scheme::Data(..) => None,
            Scheme::Relative(path) => base.map(|base| base.join(path)),
            Scheme::Absolute(path) => Some(Path::new(path).to_path_buf()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_data_uri() {
        let scheme = Scheme::try_from("data:application/octet-stream;base64,AQID").unwrap();
        assert_eq!(
            scheme,
            Scheme::Data(Some("application/octet-stream"), vec![1, 2, 3])
        );
        assert!(matches!(
            Scheme::try_from("data:image/png;base64"),
            Err(SchemeError::BadDataUri)
        ));
    }

    #[test]
    fn test_parse_paths() {
        assert_eq!(
            Scheme::try_from("textures/albedo.png").unwrap(),
            Scheme::Relative("textures/albedo.png")
        );
        assert_eq!(
            Scheme::try_from("file:///tmp/a.bin").unwrap(),
            Scheme::Absolute("/tmp/a.bin")
        );
        assert!(matches!(
            Scheme::try_from("https://example.com/a.bin"),
            Err(SchemeError::Unsupported(_))
        ));
    }

    #[test]
    fn test_relative_path_needs_base() {
        let scheme = Scheme::Relative("a.bin");
        assert_eq!(scheme.file_path(None), None);
        assert_eq!(
            scheme.file_path(Some(Path::new("models"))),
            Some(Path::new("models/a.bin").to_path_buf())
        );
    }
}
