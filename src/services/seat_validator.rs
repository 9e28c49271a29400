//! Seat bounds checks against a hall's physical dimensions.

use crate::error::FieldErrors;
use crate::models::HallDimensions;

/// Checks that `row` and `seat` exist in `hall`.
///
/// Both coordinates are checked independently, so a request that is wrong on
/// both axes gets both messages back.
pub fn validate(row: i32, seat: i32, hall: HallDimensions) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();

    for (value, field, max) in [
        (row, "row", hall.rows),
        (seat, "seat", hall.seats_in_row),
    ] {
        if !(1..=max).contains(&value) {
            errors.add(field, range_message(field, max));
        }
    }

    errors.into_result()
}

fn range_message(field: &str, max: i32) -> String {
    let mut chars = field.chars();
    let capitalized = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
        None => String::new(),
    };
    format!("{capitalized} must be in range 1 to {max}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seat_inside_hall_is_valid() {
        let hall = HallDimensions::new(5, 5);
        assert!(validate(1, 2, hall).is_ok());
        assert!(validate(5, 5, hall).is_ok());
    }

    #[test]
    fn both_fields_are_reported() {
        let errors = validate(99, 99, HallDimensions::new(10, 10)).unwrap_err();
        assert_eq!(errors.get("row"), Some(&["Row must be in range 1 to 10".to_string()][..]));
        assert_eq!(errors.get("seat"), Some(&["Seat must be in range 1 to 10".to_string()][..]));
    }

    #[test]
    fn zero_and_negative_are_out_of_range() {
        let hall = HallDimensions::new(3, 4);
        let errors = validate(0, -1, hall).unwrap_err();
        assert_eq!(errors.len(), 2);

        let errors = validate(2, 5, hall).unwrap_err();
        assert!(!errors.contains("row"));
        assert_eq!(errors.get("seat"), Some(&["Seat must be in range 1 to 4".to_string()][..]));
    }
}
