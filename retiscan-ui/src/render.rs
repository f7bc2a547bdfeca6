//! Plain-text cards for the terminal front end

use crate::history::{ClassRow, HistoryEntry, HistoryStats, PredictionDetail};
use crate::image::ImagePayload;
use crate::prediction::PredictionResult;
use retiscan_common::models::format_percent;
use retiscan_common::{DrClass, Notice, NoticeLevel, DR_CLASSES};
use std::fmt::Write;

/// Images are inline data URLs; show only their kind and size
fn describe_image(data_url: &str) -> String {
    match data_url.split_once(',') {
        Some((header, payload)) if header.starts_with("data:") => {
            let mime = header.trim_start_matches("data:").trim_end_matches(";base64");
            // base64 inflates by 4/3
            format!("{} (~{} KiB)", mime, payload.len() * 3 / 4 / 1024)
        }
        _ => data_url.to_string(),
    }
}

/// `Prediction: Class N` / `Confidence: xx.xx%` header
pub fn summary_lines(class: DrClass, confidence: f64) -> String {
    format!("Prediction: Class {}\nConfidence: {}", class.index(), format_percent(confidence))
}

fn class_table<'a>(out: &mut String, rows: impl IntoIterator<Item = &'a ClassRow>) {
    for row in rows {
        let marker = if row.predicted { '>' } else { ' ' };
        let _ = writeln!(
            out,
            " {} {} {:<14} {:>8}",
            marker,
            row.class.index(),
            row.class.name(),
            format_percent(row.confidence)
        );
    }
}

pub fn result_card(image: &ImagePayload, result: &PredictionResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== Analysis result: {} ==", image.file_name().unwrap_or("image"));
    let _ = writeln!(out, "{}", summary_lines(result.class, result.confidence()));
    let _ = writeln!(out, "{}", result.class.description());
    let _ = writeln!(out);
    let rows: Vec<ClassRow> = DR_CLASSES
        .iter()
        .map(|&class| ClassRow {
            class,
            confidence: result.confidence_scores.get(class),
            predicted: class == result.class,
        })
        .collect();
    class_table(&mut out, &rows);
    let _ = writeln!(out);
    let _ = writeln!(out, "Attention map: {}", describe_image(&result.attention_map_image));
    out
}

pub fn history_list(entries: &[HistoryEntry]) -> String {
    if entries.is_empty() {
        return "No predictions yet. Analyze an image to get started.\n".to_string();
    }

    let stats = HistoryStats::from_entries(entries);
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Total scans: {}   Normal: {}   Abnormal: {}",
        stats.total, stats.normal, stats.abnormal
    );
    let _ = writeln!(out);
    for entry in entries {
        let _ = writeln!(
            out,
            "{:<36}  {} at {}  {:<14} {:>8} ({})",
            entry.id.as_str(),
            entry.date,
            entry.time,
            entry.class.name(),
            format_percent(entry.confidence),
            entry.band.label()
        );
    }
    out
}

pub fn detail_card(detail: &PredictionDetail) -> String {
    let record = &detail.record;
    let mut out = String::new();
    let _ = writeln!(out, "== Prediction {} ==", record.id);
    let _ = writeln!(out, "Analyzed: {}", detail.created_local().format("%b %-d, %Y at %H:%M"));
    let _ = writeln!(out, "{}", summary_lines(record.class, record.confidence()));
    let _ = writeln!(out, "{} ({} confidence)", record.class.description(), record.band().label());
    let _ = writeln!(out);
    class_table(&mut out, &detail.rows);
    let _ = writeln!(out);
    let _ = writeln!(out, "Source image:  {}", describe_image(&record.source_image));
    let _ = writeln!(out, "Attention map: {}", describe_image(&record.attention_map_image));
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", record.explanation);
    out
}

pub fn notice_line(notice: &Notice) -> String {
    let tag = match notice.level {
        NoticeLevel::Info => "info",
        NoticeLevel::Success => "ok",
        NoticeLevel::Error => "error",
    };
    format!("[{}] {}: {}", tag, notice.title, notice.message)
}
