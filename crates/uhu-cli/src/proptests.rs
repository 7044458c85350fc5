//! Property-based tests for uhu-cli
//!
//! These tests verify correctness properties using proptest.

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use std::str::FromStr;

    use uhu_core::{OptionName, SetValue};

    use crate::cli::group_inputs;
    use crate::output::{OutputFormat, OutputFormatter};

    fn arb_option_name() -> impl Strategy<Value = OptionName> {
        prop::sample::select(OptionName::ALL.to_vec())
    }

    fn arb_output_format() -> impl Strategy<Value = OutputFormat> {
        prop_oneof![
            Just(OutputFormat::Table),
            Just(OutputFormat::Json),
            Just(OutputFormat::Quiet),
        ]
    }

    // Property 1: Option grouping
    //
    // For any sequence of `key=value` pairs, a key given once becomes a
    // shared value and a key given k > 1 times becomes k per-set values in
    // the order given.
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn test_group_inputs_preserves_order(
            entries in prop::collection::vec((arb_option_name(), "[a-z0-9/]{1,8}"), 0..12),
        ) {
            let pairs: Vec<(String, String)> = entries
                .iter()
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect();
            let inputs = group_inputs(pairs).unwrap();

            for (name, input) in &inputs {
                let expected: Vec<&String> = entries
                    .iter()
                    .filter(|(n, _)| n == name)
                    .map(|(_, v)| v)
                    .collect();
                match input {
                    SetValue::Shared(value) => {
                        prop_assert_eq!(expected.len(), 1);
                        prop_assert_eq!(&value.to_string(), expected[0]);
                    }
                    SetValue::PerSet(values) => {
                        prop_assert!(expected.len() > 1);
                        let got: Vec<String> = values.iter().map(ToString::to_string).collect();
                        let want: Vec<String> = expected.into_iter().cloned().collect();
                        prop_assert_eq!(got, want);
                    }
                }
            }
        }
    }

    // Property 2: Output format round trip
    //
    // For any output format, parsing its display form yields the same format
    // regardless of letter case.
    proptest! {
        #[test]
        fn test_output_format_round_trip(format in arb_output_format(), upper in any::<bool>()) {
            let text = if upper { format.to_string().to_uppercase() } else { format.to_string() };
            prop_assert_eq!(OutputFormat::from_str(&text).unwrap(), format);
        }
    }

    // Property 3: JSON output is always valid JSON
    //
    // For any success message, the JSON formatter produces a parsable
    // envelope carrying the message and command.
    proptest! {
        #[test]
        fn test_json_success_is_valid(message in ".{0,64}", command in "[a-z ]{1,16}") {
            let formatter = OutputFormatter::new(OutputFormat::Json, false);
            let output = formatter.format_success(&crate::SuccessMessage::new(message.clone()), &command);
            let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
            prop_assert_eq!(parsed["success"].as_bool(), Some(true));
            prop_assert_eq!(parsed["data"]["message"].as_str(), Some(message.as_str()));
            prop_assert_eq!(parsed["command"].as_str(), Some(command.as_str()));
        }
    }
}
