use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub ok: bool,
    pub filename: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_response_shape() {
        let res = UploadResponse {
            ok: true,
            filename: "2024-05-01_meal2.webm".into(),
        };
        assert_eq!(
            serde_json::to_value(&res).unwrap(),
            serde_json::json!({ "ok": true, "filename": "2024-05-01_meal2.webm" })
        );
    }
}
