//! Utilidades de validación
//!
//! Funciones helper para validar matrículas, VIN y data URLs de fotos.
//! Se usan como validadores custom de `validator`.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use lazy_static::lazy_static;
use regex::Regex;
use validator::ValidationError;

lazy_static! {
    static ref LICENSE_PLATE_RE: Regex = Regex::new(r"^[A-Z0-9][A-Z0-9 \-]{1,11}$").unwrap();
    static ref VIN_RE: Regex = Regex::new(r"^[A-HJ-NPR-Z0-9]{17}$").unwrap();
    static ref DATA_URL_RE: Regex =
        Regex::new(r"^data:(?P<mime>image/[a-zA-Z0-9.+\-]+);base64,(?P<data>[A-Za-z0-9+/=\s]+)$").unwrap();
}

/// Validar formato de matrícula (mayúsculas, dígitos, espacios y guiones)
pub fn validate_license_plate(value: &str) -> Result<(), ValidationError> {
    if !LICENSE_PLATE_RE.is_match(&value.trim().to_uppercase()) {
        let mut error = ValidationError::new("license_plate");
        error.add_param("value".into(), &value.to_string());
        return Err(error);
    }
    Ok(())
}

/// Validar VIN de 17 caracteres (sin I, O ni Q)
pub fn validate_vin(value: &str) -> Result<(), ValidationError> {
    if !VIN_RE.is_match(&value.trim().to_uppercase()) {
        let mut error = ValidationError::new("vin");
        error.add_param("value".into(), &value.to_string());
        return Err(error);
    }
    Ok(())
}

/// Validar que un string no esté vacío
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("not_blank"));
    }
    Ok(())
}

/// Foto decodificada desde un data URL
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl DecodedImage {
    /// Extensión de archivo a partir del content type
    pub fn extension(&self) -> &str {
        match self.content_type.as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/png" => "png",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "bin",
        }
    }
}

/// Indica si el valor parece un data URL de imagen
pub fn is_data_url(value: &str) -> bool {
    value.starts_with("data:image/")
}

/// Decodificar un data URL base64 de imagen
pub fn decode_data_url(value: &str) -> Option<DecodedImage> {
    let caps = DATA_URL_RE.captures(value)?;
    let payload: String = caps["data"].chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD.decode(payload).ok()?;
    if bytes.is_empty() {
        return None;
    }
    Some(DecodedImage {
        content_type: caps["mime"].to_string(),
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_license_plate() {
        assert!(validate_license_plate("ABC-1234").is_ok());
        assert!(validate_license_plate("7xyz 123").is_ok());
        assert!(validate_license_plate("!").is_err());
    }

    #[test]
    fn test_vin() {
        assert!(validate_vin("1HGCM82633A004352").is_ok());
        assert!(validate_vin("1HGCM82633A00435").is_err());
        assert!(validate_vin("1HGCM82633A00435O").is_err());
    }

    #[test]
    fn test_decode_data_url() {
        let image = decode_data_url("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(image.content_type, "image/png");
        assert_eq!(image.bytes, b"hello");
        assert_eq!(image.extension(), "png");

        assert!(decode_data_url("wash-photos/a/b.jpg").is_none());
        assert!(decode_data_url("data:image/png;base64,***").is_none());
    }
}
