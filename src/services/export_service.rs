use crate::error::Result;
use crate::models::result::TestResult;
use crate::models::test::Test;
use rust_xlsxwriter::*;
use std::collections::HashMap;
use uuid::Uuid;

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

pub struct ExportService;

impl ExportService {
    /// Styled XLSX workbook with one row per result and a summary line.
    pub fn generate_results_xlsx(
        results: &[TestResult],
        tests: &HashMap<Uuid, Test>,
    ) -> Result<Vec<u8>> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name("Results")?;

        // ── Color palette ──
        let primary_color = Color::RGB(0x1E293B);
        let header_bg = Color::RGB(0x0F172A);
        let header_text = Color::White;
        let alt_row_1 = Color::RGB(0xF8FAFC);
        let alt_row_2 = Color::White;
        let border_color = Color::RGB(0xE2E8F0);
        let passed_color = Color::RGB(0x10B981);
        let failed_color = Color::RGB(0xEF4444);

        let columns = [
            ("#", 6.0),
            ("Test", 32.0),
            ("User", 38.0),
            ("Session", 38.0),
            ("Correct", 10.0),
            ("Questions", 11.0),
            ("Percentage", 12.0),
            ("Passing score", 14.0),
            ("Result", 12.0),
            ("Time spent (min)", 16.0),
            ("Submitted at", 20.0),
        ];
        for (i, (_, width)) in columns.iter().enumerate() {
            worksheet.set_column_width(i as u16, *width)?;
        }
        let last_col = (columns.len() - 1) as u16;

        // ── Title rows ──
        let title_format = Format::new()
            .set_font_size(16)
            .set_bold()
            .set_font_color(header_text)
            .set_background_color(primary_color)
            .set_align(FormatAlign::CenterAcross)
            .set_align(FormatAlign::VerticalCenter);
        worksheet.set_row_height(0, 40)?;
        worksheet.merge_range(0, 0, 0, last_col, "Test results", &title_format)?;

        let subtitle_format = Format::new()
            .set_font_size(10)
            .set_italic()
            .set_font_color(Color::RGB(0x94A3B8))
            .set_background_color(primary_color)
            .set_align(FormatAlign::CenterAcross)
            .set_align(FormatAlign::VerticalCenter);
        worksheet.set_row_height(1, 22)?;
        let now = chrono::Utc::now().format("%Y-%m-%d %H:%M UTC").to_string();
        let subtitle = format!("Exported: {}  •  Results: {}", now, results.len());
        worksheet.merge_range(1, 0, 1, last_col, &subtitle, &subtitle_format)?;

        // ── Header row ──
        let header_format = Format::new()
            .set_bold()
            .set_font_size(10)
            .set_font_color(header_text)
            .set_background_color(header_bg)
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter)
            .set_text_wrap()
            .set_border(FormatBorder::Thin)
            .set_border_color(border_color);
        let header_row = 2;
        worksheet.set_row_height(header_row, 30)?;
        for (i, (name, _)) in columns.iter().enumerate() {
            worksheet.write_string_with_format(header_row, i as u16, *name, &header_format)?;
        }

        // ── Data rows ──
        let data_start_row = 3;
        for (idx, result) in results.iter().enumerate() {
            let row = data_start_row + idx as u32;
            let bg = if idx % 2 == 0 { alt_row_1 } else { alt_row_2 };
            let base_fmt = Format::new()
                .set_font_size(10)
                .set_background_color(bg)
                .set_align(FormatAlign::VerticalCenter)
                .set_border(FormatBorder::Thin)
                .set_border_color(border_color);
            let center_fmt = base_fmt.clone().set_align(FormatAlign::Center);

            let test = tests.get(&result.test_id);
            let title = test.map(|t| t.title.as_str()).unwrap_or("-");
            let passing = test
                .map(|t| t.passing_score.to_string())
                .unwrap_or_else(|| "-".to_string());

            worksheet.set_row_height(row, 22)?;
            worksheet.write_number_with_format(row, 0, (idx + 1) as f64, &center_fmt)?;
            worksheet.write_string_with_format(row, 1, title, &base_fmt.clone().set_bold())?;
            worksheet.write_string_with_format(row, 2, result.user_id.to_string(), &base_fmt)?;
            worksheet.write_string_with_format(row, 3, result.session_id.to_string(), &base_fmt)?;
            worksheet.write_number_with_format(row, 4, result.score as f64, &center_fmt)?;
            worksheet.write_number_with_format(row, 5, result.total_questions as f64, &center_fmt)?;
            worksheet.write_number_with_format(row, 6, result.percentage as f64, &center_fmt)?;
            worksheet.write_string_with_format(row, 7, &passing, &center_fmt)?;

            let verdict_fmt = Format::new()
                .set_font_size(10)
                .set_bold()
                .set_font_color(Color::White)
                .set_background_color(if result.passed { passed_color } else { failed_color })
                .set_align(FormatAlign::Center)
                .set_align(FormatAlign::VerticalCenter)
                .set_border(FormatBorder::Thin)
                .set_border_color(border_color);
            let verdict = if result.passed { "Passed" } else { "Failed" };
            worksheet.write_string_with_format(row, 8, verdict, &verdict_fmt)?;

            worksheet.write_number_with_format(
                row,
                9,
                result.time_spent_minutes as f64,
                &center_fmt,
            )?;
            let submitted = result.created_at.format("%Y-%m-%d %H:%M").to_string();
            worksheet.write_string_with_format(row, 10, &submitted, &center_fmt)?;
        }

        // ── Summary row ──
        let total_row = data_start_row + results.len() as u32 + 1;
        let summary_fmt = Format::new()
            .set_bold()
            .set_font_size(10)
            .set_font_color(primary_color)
            .set_background_color(Color::RGB(0xE0E7FF))
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter)
            .set_border(FormatBorder::Thin)
            .set_border_color(border_color);
        worksheet.set_row_height(total_row, 26)?;

        let passed = results.iter().filter(|r| r.passed).count();
        let avg_percentage = if results.is_empty() {
            0.0
        } else {
            results.iter().map(|r| r.percentage as f64).sum::<f64>() / results.len() as f64
        };
        let summary = format!(
            "Total: {} | Passed: {} | Failed: {} | Avg. percentage: {:.0}%",
            results.len(),
            passed,
            results.len() - passed,
            avg_percentage
        );
        worksheet.merge_range(total_row, 0, total_row, last_col, &summary, &summary_fmt)?;

        worksheet.set_freeze_panes(3, 0)?;
        worksheet.autofilter(
            2,
            0,
            (data_start_row + results.len() as u32).saturating_sub(1).max(2),
            last_col,
        )?;

        Ok(workbook.save_to_buffer()?)
    }
}
