/// Smallest valid PNG (1x1)
pub const PNG_BYTES: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, // PNG signature
    0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52, // IHDR chunk
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, // 1x1 dimensions
    0x08, 0x02, 0x00, 0x00, 0x00, 0x90, 0x77, 0x53, 0xDE, //
    0x00, 0x00, 0x00, 0x0C, 0x49, 0x44, 0x41, 0x54, // IDAT chunk
    0x08, 0xD7, 0x63, 0xF8, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, //
    0x00, 0x18, 0xDD, 0x8D, 0x89, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, //
    0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82, // IEND chunk
];

pub const GRANT_BODY: &str = r#"{"cloudName":"demo","apiKey":"key-1","timestamp":1700000000,"signature":"sig-1","upload_preset":"avatars"}"#;

pub const PUBLIC_ID: &str = "avatars/u1/img1";
pub const SECURE_URL: &str = "https://res.cloudinary.com/demo/image/upload/v1/avatars/u1/img1.jpg";
pub const THUMBNAIL_URL: &str =
    "https://res.cloudinary.com/demo/image/upload/c_fill,g_face,h_256,w_256/v1/avatars/u1/img1.jpg";

pub fn asset_body(public_id: &str, secure_url: &str) -> String {
    serde_json::json!({
        "public_id": public_id,
        "secure_url": secure_url,
        "format": "jpg",
        "bytes": 68,
    })
    .to_string()
}
