//! Runtime faults raised by compiled BASIC programs.
//!
//! The list lives in `resources/runtime-faults.csv` and the build script
//! turns it into the [`Fault`] enumeration. The compiler embeds
//! [`Fault::message`] into the generated class so that the program reports
//! the fault with the exact BASIC diagnostic.

include!(concat!(env!("OUT_DIR"), "/faults.rs"));

impl std::fmt::Display for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.code(), self.message())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::Fault;

    #[test]
    fn all_when_codes_then_unique() {
        let codes: HashSet<_> = Fault::ALL.iter().map(|f| f.code()).collect();
        assert_eq!(codes.len(), Fault::ALL.len());
    }

    #[test]
    fn all_when_messages_then_unique_and_terminated() {
        let messages: HashSet<_> = Fault::ALL.iter().map(|f| f.message()).collect();
        assert_eq!(messages.len(), Fault::ALL.len());
        for fault in Fault::ALL {
            assert!(fault.message().ends_with('.'), "{}", fault.code());
        }
    }

    #[test]
    fn message_when_out_of_data_then_basic_text() {
        assert_eq!(Fault::OutOfData.message(), "Out of DATA.");
    }

    #[test]
    fn message_when_num1_max_bounds_then_basic_text() {
        assert_eq!(
            Fault::IndexOutOfMaxBoundsNum1.message(),
            "Index of 1D number array out of max bounds."
        );
    }

    #[test]
    fn display_when_fault_then_code_and_message() {
        assert_eq!(Fault::Overflow.to_string(), "R0031 Overflow.");
    }
}
