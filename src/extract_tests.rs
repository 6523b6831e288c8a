// src/extract_tests.rs

#[cfg(test)]
mod tests {
    use crate::classify::ArrivalWindow;
    use crate::error::AttendanceError;
    use crate::extract::*;
    use chrono::NaiveTime;
    use std::io::Cursor;

    fn t(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    fn window(start: NaiveTime, end: NaiveTime) -> ArrivalWindow {
        ArrivalWindow { start, end }
    }

    fn row(date_time: &str, id_number: &str, first: &str, last: &str) -> SignInRow {
        SignInRow {
            date_time: date_time.to_string(),
            id_number: id_number.to_string(),
            first_name: first.to_string(),
            last_name: last.to_string(),
        }
    }

    // P1 on the normal Monday-Thursday bell schedule.
    fn p1_window() -> ArrivalWindow {
        window(t(9, 5), t(10, 12))
    }

    #[test]
    fn normalize_strips_spreadsheet_float_artifacts() {
        assert_eq!(normalize_student_id("123.0"), Some("123".to_string()));
        assert_eq!(normalize_student_id("123"), Some("123".to_string()));
        assert_eq!(normalize_student_id(" 456 "), Some("456".to_string()));
        assert_eq!(normalize_student_id("123.5"), Some("123".to_string()));
        assert_eq!(normalize_student_id("007"), Some("7".to_string()));
        assert_eq!(normalize_student_id("0.0"), Some("0".to_string()));
    }

    #[test]
    fn normalize_keeps_alphanumeric_ids() {
        assert_eq!(normalize_student_id("AB-12"), Some("AB-12".to_string()));
        assert_eq!(normalize_student_id("x9"), Some("x9".to_string()));
    }

    #[test]
    fn normalize_rejects_unusable_ids() {
        assert_eq!(normalize_student_id(""), None);
        assert_eq!(normalize_student_id("   "), None);
        assert_eq!(normalize_student_id("???"), None);
        assert_eq!(normalize_student_id("12 34"), None);
    }

    #[test]
    fn timestamp_parser_accepts_both_export_styles() {
        assert!(parse_sign_in_timestamp("05/01/2025 09:30:00 AM").is_some());
        assert!(parse_sign_in_timestamp("05/01/2025 09:30 AM").is_some());
        assert!(parse_sign_in_timestamp("2025-05-01 09:30:00").is_some());
        assert!(parse_sign_in_timestamp("2025-05-01 09:30").is_some());
        assert!(parse_sign_in_timestamp("").is_none());
        assert!(parse_sign_in_timestamp("yesterday-ish").is_none());
    }

    #[test]
    fn repeat_sign_ins_collapse_to_the_earliest_arrival() {
        // Same student as "123.0" at 09:30 and "123" at 09:40.
        let rows = vec![
            row("2025-05-01 09:30:00", "123.0", "Ada", "Lovelace"),
            row("2025-05-01 09:40:00", "123", "Ada", "Lovelace"),
        ];
        let (records, summary) = extract(&rows, p1_window());

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].student_id, "123");
        assert_eq!(records[0].arrived_at.time(), t(9, 30));
        assert_eq!(summary.included, 1);
        assert_eq!(summary.duplicates_collapsed, 1);
    }

    #[test]
    fn earliest_arrival_wins_regardless_of_row_order() {
        let earlier = row("2025-05-01 09:20:00", "55", "Kai", "Ito");
        let later = row("2025-05-01 09:50:00", "55", "Kai", "Ito");

        let (forward, _) = extract(&[earlier.clone(), later.clone()], p1_window());
        let (reversed, _) = extract(&[later, earlier], p1_window());

        assert_eq!(forward, reversed);
        assert_eq!(forward[0].arrived_at.time(), t(9, 20));
    }

    #[test]
    fn window_bounds_are_inclusive_on_both_ends() {
        let rows = vec![
            row("2025-05-01 09:05:00", "1", "A", "A"),
            row("2025-05-01 10:12:00", "2", "B", "B"),
            row("2025-05-01 09:04:00", "3", "C", "C"),
            row("2025-05-01 10:13:00", "4", "D", "D"),
        ];
        let (records, summary) = extract(&rows, p1_window());

        let ids: Vec<&str> = records.iter().map(|r| r.student_id.as_str()).collect();
        assert_eq!(ids, ["1", "2"]);
        assert_eq!(summary.out_of_window, 2);
    }

    #[test]
    fn rows_without_usable_timestamps_are_counted_not_fatal() {
        let rows = vec![
            row("", "10", "A", "A"),
            row("not a time", "11", "B", "B"),
            row("2025-05-01 09:30:00", "12", "C", "C"),
        ];
        let (records, summary) = extract(&rows, p1_window());

        assert_eq!(records.len(), 1);
        assert_eq!(summary.missing_timestamp, 2);
        assert_eq!(summary.included, 1);
    }

    #[test]
    fn rows_with_unusable_ids_are_counted_not_fatal() {
        let rows = vec![
            row("2025-05-01 09:30:00", "", "A", "A"),
            row("2025-05-01 09:31:00", "!!", "B", "B"),
            row("2025-05-01 09:32:00", "77", "C", "C"),
        ];
        let (records, summary) = extract(&rows, p1_window());

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].student_id, "77");
        assert_eq!(summary.bad_id, 2);
    }

    #[test]
    fn output_is_sorted_by_student_id_for_determinism() {
        let rows = vec![
            row("2025-05-01 09:30:00", "300", "C", "C"),
            row("2025-05-01 09:31:00", "100", "A", "A"),
            row("2025-05-01 09:32:00", "200", "B", "B"),
        ];
        let (records, _) = extract(&rows, p1_window());
        let ids: Vec<&str> = records.iter().map(|r| r.student_id.as_str()).collect();
        assert_eq!(ids, ["100", "200", "300"]);
    }

    #[test]
    fn all_rows_rejected_still_reports_full_accounting() {
        let rows = vec![
            row("", "1", "A", "A"),
            row("2025-05-01 07:00:00", "2", "B", "B"),
        ];
        let (records, summary) = extract(&rows, p1_window());

        assert!(records.is_empty());
        assert_eq!(summary.total_rows, 2);
        assert_eq!(summary.missing_timestamp, 1);
        assert_eq!(summary.out_of_window, 1);
        assert_eq!(summary.included, 0);
    }

    #[test]
    fn csv_reader_parses_the_export_headers() {
        let csv = "Date/Time,ID Number,First Name,Last Name\n\
                   2025-05-01 09:30:00,123.0,Ada,Lovelace\n\
                   2025-05-01 09:45:00,456,Grace,Hopper\n";
        let rows = read_sign_in_rows(Cursor::new(csv)).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id_number, "123.0");
        assert_eq!(rows[1].first_name, "Grace");
    }

    #[test]
    fn csv_reader_fails_fast_when_key_columns_are_missing() {
        let csv = "When,Who\n2025-05-01 09:30:00,123\n";
        let result = read_sign_in_rows(Cursor::new(csv));
        assert!(matches!(result, Err(AttendanceError::Schema { .. })));
    }
}
