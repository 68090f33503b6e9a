use validator::{Validate, ValidationErrors};

use crate::errors::AppError;

pub fn validate_payload<T: Validate>(payload: &T) -> Result<(), AppError> {
    payload.validate().map_err(validation_error)
}

/// Flattens field errors into `field: [code: message]; ...`.
pub fn validation_error(err: ValidationErrors) -> AppError {
    let mut fields: Vec<String> = err
        .field_errors()
        .iter()
        .map(|(field, errs)| {
            let errors = errs
                .iter()
                .map(|e| format!("{}: {}", e.code, e.message.as_deref().unwrap_or("")))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{}: [{}]", field, errors)
        })
        .collect();
    fields.sort();
    AppError::BadRequest(format!("Validation failed: {}", fields.join("; ")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Validate)]
    struct Probe {
        #[validate(email)]
        email: String,
        #[validate(length(min = 3))]
        name: String,
    }

    #[test]
    fn reports_each_failing_field() {
        let probe = Probe {
            email: "nope".into(),
            name: "ab".into(),
        };
        match validate_payload(&probe) {
            Err(AppError::BadRequest(msg)) => {
                assert!(msg.contains("email: [email"), "{}", msg);
                assert!(msg.contains("name: [length"), "{}", msg);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn valid_payload_passes() {
        let probe = Probe {
            email: "ada@example.org".into(),
            name: "Ada".into(),
        };
        assert!(validate_payload(&probe).is_ok());
    }
}
