use crate::errors::AppError;

pub const MAX_ID_DIGITS: usize = 9;
pub const MAX_CAR_DIGITS: usize = 8;

/// Keeps only ASCII digits, so "12-345-67" and "12 345 67" both become "1234567".
pub fn digits_only(input: &str) -> String {
    input.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Sanitises the check form: both fields digits only, non-empty, within length.
///
/// Returns `(id_number, car_number)`.
pub fn validate_check_input(id_number: &str, car_number: &str) -> Result<(String, String), AppError> {
    let id = digits_only(id_number);
    let car = digits_only(car_number);

    if id.is_empty() {
        return Err(AppError::BadRequest("ID number is required".to_string()));
    }
    if car.is_empty() {
        return Err(AppError::BadRequest("car number is required".to_string()));
    }
    if id.len() > MAX_ID_DIGITS {
        return Err(AppError::BadRequest(format!(
            "ID number must be at most {} digits",
            MAX_ID_DIGITS
        )));
    }
    if car.len() > MAX_CAR_DIGITS {
        return Err(AppError::BadRequest(format!(
            "car number must be at most {} digits",
            MAX_CAR_DIGITS
        )));
    }

    Ok((id, car))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formatting_is_stripped() {
        let (id, car) = validate_check_input(" 12345678-2 ", "12-345-67").unwrap();
        assert_eq!(id, "123456782");
        assert_eq!(car, "1234567");
    }

    #[test]
    fn test_empty_fields_rejected() {
        assert!(validate_check_input("", "1234567").is_err());
        assert!(validate_check_input("123456782", "abc").is_err());
    }

    #[test]
    fn test_too_long_rejected() {
        assert!(validate_check_input("1234567890", "1234567").is_err());
        assert!(validate_check_input("123456782", "123456789").is_err());
        assert!(validate_check_input("123456782", "12345678").is_ok());
    }
}
