//! Hand-built `multipart/form-data` bodies.
//!
//! The layout is fixed byte for byte so that existing receivers keep
//! parsing it. For boundary `B`, part name `P`, file name `F` and text
//! fields `k=v`:
//!
//! ```text
//! --B\r\n
//! Content-Disposition: form-data; name="P"; filename="F"\r\n
//! Content-Type: image/jpeg\r\n
//! Content-Transfer-Encoding: binary\r\n
//! \r\n
//! <file bytes>\r\n
//! --B\r\n                                   ┐
//! Content-Disposition: form-data; name="k"\r\n │ once per field
//! Content-Type: text/plain\r\n                 │
//! \r\n                                         │
//! v\r\n                                        ┘
//! --B--\r\n
//! ```
//!
//! The file part is always labelled `image/jpeg`, whatever the encoder
//! actually produced.
//!
//! Everything except the file bytes is rendered up front, so the total
//! length is known before streaming starts and the request can carry a
//! `Content-Length`. The file itself is streamed through [`MultipartReader`]
//! in chunks of at most [`MAX_CHUNK`] bytes.

use super::UploadError;
use crate::cancel::CancelToken;
use std::io::{self, Chain, Cursor, Read};
use std::time::{SystemTime, UNIX_EPOCH};

const CRLF: &str = "\r\n";
const TWO_HYPHENS: &str = "--";

/// Largest slice of the file handed to the transport in one read.
pub const MAX_CHUNK: usize = 1024 * 1024;

/// A plain-text form part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    pub name: String,
    pub value: String,
}

/// Parse `key=value&key=value` into form fields.
///
/// Splits on `&`, then on the first `=`; the value keeps any further `=`.
/// An empty string yields no fields. A segment without `=` is rejected.
pub fn parse_form_fields(raw: &str) -> Result<Vec<FormField>, UploadError> {
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    raw.split('&')
        .map(|segment| {
            segment
                .split_once('=')
                .map(|(name, value)| FormField {
                    name: name.to_string(),
                    value: value.to_string(),
                })
                .ok_or_else(|| UploadError::MalformedFields {
                    segment: segment.to_string(),
                })
        })
        .collect()
}

/// Boundary token for a timestamp in Unix milliseconds.
pub fn boundary_for(millis: u128) -> String {
    format!("*****{millis}*****")
}

/// Boundary token for the current time.
pub fn boundary_now() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    boundary_for(millis)
}

/// A multipart body with one file part followed by text fields.
#[derive(Debug, Clone)]
pub struct MultipartForm {
    boundary: String,
    head: Vec<u8>,
    tail: Vec<u8>,
}

impl MultipartForm {
    pub fn new(boundary: &str, part_name: &str, file_name: &str, fields: &[FormField]) -> Self {
        let head = format!(
            "{TWO_HYPHENS}{boundary}{CRLF}\
             Content-Disposition: form-data; name=\"{part_name}\"; filename=\"{file_name}\"{CRLF}\
             Content-Type: image/jpeg{CRLF}\
             Content-Transfer-Encoding: binary{CRLF}\
             {CRLF}"
        );

        let mut tail = String::from(CRLF);
        for field in fields {
            tail.push_str(&format!(
                "{TWO_HYPHENS}{boundary}{CRLF}\
                 Content-Disposition: form-data; name=\"{}\"{CRLF}\
                 Content-Type: text/plain{CRLF}\
                 {CRLF}\
                 {}{CRLF}",
                field.name, field.value
            ));
        }
        tail.push_str(&format!("{TWO_HYPHENS}{boundary}{TWO_HYPHENS}{CRLF}"));

        Self {
            boundary: boundary.to_string(),
            head: head.into_bytes(),
            tail: tail.into_bytes(),
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Value for the request's `Content-Type` header.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Total body length for a file of `file_len` bytes.
    pub fn content_length(&self, file_len: u64) -> u64 {
        self.head.len() as u64 + file_len + self.tail.len() as u64
    }

    /// Render the whole body in memory.
    pub fn to_bytes(&self, file: &[u8]) -> Vec<u8> {
        let mut body = Vec::with_capacity(self.head.len() + file.len() + self.tail.len());
        body.extend_from_slice(&self.head);
        body.extend_from_slice(file);
        body.extend_from_slice(&self.tail);
        body
    }

    /// Stream the body, reading the file part from `file`.
    pub fn into_reader<R: Read>(self, file: R, cancel: CancelToken) -> MultipartReader<R> {
        let file = ChunkedReader { inner: file, cancel };
        MultipartReader {
            inner: Cursor::new(self.head).chain(file).chain(Cursor::new(self.tail)),
        }
    }
}

/// Streaming multipart body. Owns the file handle, so dropping the reader
/// (on success, error or cancellation) closes the file.
pub struct MultipartReader<R> {
    inner: Chain<Chain<Cursor<Vec<u8>>, ChunkedReader<R>>, Cursor<Vec<u8>>>,
}

impl<R: Read> Read for MultipartReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

/// Caps each read at [`MAX_CHUNK`] and stops once cancelled.
struct ChunkedReader<R> {
    inner: R,
    cancel: CancelToken,
}

impl<R: Read> Read for ChunkedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.cancel.is_cancelled() {
            return Err(io::Error::other("upload cancelled"));
        }
        let len = buf.len().min(MAX_CHUNK);
        self.inner.read(&mut buf[..len])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> Vec<FormField> {
        pairs
            .iter()
            .map(|(n, v)| FormField {
                name: n.to_string(),
                value: v.to_string(),
            })
            .collect()
    }

    #[test]
    fn parse_single_field() {
        assert_eq!(
            parse_form_fields("submit=Upload").unwrap(),
            fields(&[("submit", "Upload")])
        );
    }

    #[test]
    fn parse_multiple_fields_keeps_order() {
        assert_eq!(
            parse_form_fields("a=1&b=2&c=").unwrap(),
            fields(&[("a", "1"), ("b", "2"), ("c", "")])
        );
    }

    #[test]
    fn parse_value_keeps_extra_equals() {
        assert_eq!(
            parse_form_fields("token=a=b").unwrap(),
            fields(&[("token", "a=b")])
        );
    }

    #[test]
    fn parse_empty_string_yields_nothing() {
        assert!(parse_form_fields("").unwrap().is_empty());
    }

    #[test]
    fn parse_segment_without_equals_is_rejected() {
        let err = parse_form_fields("submit=Upload&oops").unwrap_err();
        assert!(matches!(err, UploadError::MalformedFields { segment } if segment == "oops"));
    }

    #[test]
    fn boundary_wraps_timestamp_in_asterisks() {
        assert_eq!(boundary_for(1700000000123), "*****1700000000123*****");
        let now = boundary_now();
        assert!(now.starts_with("*****") && now.ends_with("*****"));
        assert!(now.len() > 10);
    }

    #[test]
    fn body_layout_is_exact() {
        let form = MultipartForm::new(
            "*****42*****",
            "fileToUpload",
            "IMG.jpeg",
            &fields(&[("submit", "Upload")]),
        );
        let body = form.to_bytes(b"JPEGDATA");
        let expected = "--*****42*****\r\n\
            Content-Disposition: form-data; name=\"fileToUpload\"; filename=\"IMG.jpeg\"\r\n\
            Content-Type: image/jpeg\r\n\
            Content-Transfer-Encoding: binary\r\n\
            \r\n\
            JPEGDATA\r\n\
            --*****42*****\r\n\
            Content-Disposition: form-data; name=\"submit\"\r\n\
            Content-Type: text/plain\r\n\
            \r\n\
            Upload\r\n\
            --*****42*****--\r\n";
        assert_eq!(String::from_utf8(body).unwrap(), expected);
    }

    #[test]
    fn body_has_file_part_then_fields_with_one_boundary() {
        let form = MultipartForm::new(
            "*****7*****",
            "fileToUpload",
            "IMG.jpeg",
            &parse_form_fields("submit=Upload").unwrap(),
        );
        let body = String::from_utf8(form.to_bytes(b"x")).unwrap();

        let delimiter = "--*****7*****\r\n";
        assert_eq!(body.matches(delimiter).count(), 2);
        assert!(body.ends_with("--*****7*****--\r\n"));

        let file_at = body.find("name=\"fileToUpload\"").unwrap();
        let submit_at = body.find("name=\"submit\"").unwrap();
        assert!(file_at < submit_at);
    }

    #[test]
    fn body_without_fields_closes_after_file() {
        let form = MultipartForm::new("B", "f", "n", &[]);
        let body = String::from_utf8(form.to_bytes(b"z")).unwrap();
        assert!(body.ends_with("z\r\n--B--\r\n"));
    }

    #[test]
    fn content_length_matches_rendered_body() {
        let form = MultipartForm::new("*****1*****", "f", "IMG.jpeg", &fields(&[("k", "v")]));
        let file = vec![7u8; 1234];
        assert_eq!(form.content_length(1234), form.to_bytes(&file).len() as u64);
        assert_eq!(form.content_type(), "multipart/form-data; boundary=*****1*****");
    }

    #[test]
    fn reader_streams_same_bytes_as_to_bytes() {
        let form = MultipartForm::new("*****9*****", "f", "IMG.jpeg", &fields(&[("a", "b")]));
        let file: Vec<u8> = (0..(MAX_CHUNK + 4096)).map(|i| (i % 251) as u8).collect();
        let expected = form.to_bytes(&file);

        let mut streamed = Vec::new();
        form.into_reader(Cursor::new(file), CancelToken::new())
            .read_to_end(&mut streamed)
            .unwrap();
        assert_eq!(streamed, expected);
    }

    #[test]
    fn reader_never_reads_more_than_a_chunk_of_file() {
        let form = MultipartForm::new("B", "f", "n", &[]);
        let file = vec![1u8; MAX_CHUNK * 2];
        let mut reader = form.into_reader(Cursor::new(file), CancelToken::new());

        let mut buf = vec![0u8; MAX_CHUNK * 3];
        let mut total = 0;
        loop {
            let n = reader.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            assert!(n <= MAX_CHUNK);
            total += n;
        }
        assert!(total > MAX_CHUNK * 2);
    }

    #[test]
    fn cancelled_reader_fails_on_file_part() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let form = MultipartForm::new("B", "f", "n", &[]);
        let mut out = Vec::new();
        let err = form
            .into_reader(Cursor::new(vec![0u8; 16]), cancel)
            .read_to_end(&mut out)
            .unwrap_err();
        assert_eq!(err.to_string(), "upload cancelled");
    }
}
