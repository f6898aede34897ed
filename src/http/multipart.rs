use reqwest::multipart::{Form, Part};

use super::{HttpError, InvalidRequest};
use crate::builder::CreateAttachment;
use crate::internal::prelude::*;
use crate::json::{self, json};

/// Holder for multipart body. Contains files and the JSON body that is sent as `payload_json`
/// alongside them.
#[derive(Clone, Debug)]
pub struct Multipart<'a> {
    pub files: &'a [CreateAttachment],
    /// JSON body that will be stringified and set as the form value as `payload_json`.
    pub payload_json: Option<&'a Value>,
}

impl Multipart<'_> {
    /// The `payload_json` that will be sent, with an `attachments` entry describing every file.
    ///
    /// # Errors
    ///
    /// [`InvalidRequest::PayloadNotAnObject`] if the JSON body is not an object.
    pub fn payload(&self) -> StdResult<Value, HttpError> {
        attachments_payload(self.payload_json, self.files)
    }

    /// Builds the form data. Files are named `files[0]`, `files[1]`, ... in order.
    pub(super) fn build_form(&self) -> Result<Form> {
        let mut multipart = Form::new();

        for (file_num, file) in self.files.iter().enumerate() {
            let part = Part::bytes(file.data.clone());
            let part = guess_mime_str(part, &file.filename)?.file_name(file.filename.clone());

            multipart = multipart.part(format!("files[{file_num}]"), part);
        }

        let payload = self.payload()?;
        Ok(multipart.text("payload_json", json::to_string(&payload)?))
    }
}

/// Adds the metadata of `files` to `body` as its `attachments` array, unless the body already has
/// one. Without a body, the payload consists of the attachments alone.
///
/// # Errors
///
/// [`InvalidRequest::PayloadNotAnObject`] if `body` is not a JSON object.
pub fn attachments_payload(
    body: Option<&Value>,
    files: &[CreateAttachment],
) -> StdResult<Value, HttpError> {
    let mut payload = match body {
        Some(Value::Object(map)) => map.clone(),
        Some(_) => return Err(InvalidRequest::PayloadNotAnObject.into()),
        None => JsonMap::new(),
    };

    if !payload.contains_key("attachments") {
        let attachments = files
            .iter()
            .enumerate()
            .map(|(position, file)| {
                let mut attachment = JsonMap::new();
                attachment.insert("id".into(), json!(file.id.unwrap_or(position as u64)));
                attachment.insert("filename".into(), json!(file.filename));
                if let Some(description) = &file.description {
                    attachment.insert("description".into(), json!(description));
                }
                if let Some(flags) = file.flags {
                    attachment.insert("flags".into(), json!(flags));
                }
                Value::Object(attachment)
            })
            .collect();

        payload.insert("attachments".into(), Value::Array(attachments));
    }

    Ok(Value::Object(payload))
}

fn guess_mime_str(part: Part, filename: &str) -> Result<Part> {
    // This is required for certain endpoints like create sticker, otherwise the API will respond
    // with a 500 Internal Server Error. The mime type chosen is the same as what reqwest does
    // internally when using Part::file(), but it is not done for any of the other methods we use.
    // https://datatracker.ietf.org/doc/html/rfc7578#section-4.4
    let mime_type = mime_guess::from_path(filename).first_or_octet_stream();
    part.mime_str(mime_type.essence_str()).map_err(Into::into)
}
