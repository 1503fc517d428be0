//! The PDF form as an ordered list of blocks.
//!
//! Blocks carry content and typographic intent only; positions, wrapping
//! and page breaks are decided by the renderer in `pdf`.

use super::{format_date_fr, ReportInput};
use crate::rubric::{RatingLevel, CLUSTERS, LEVELS};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PdfLayout {
    /// Table with cluster, sub-competency, level and comment columns.
    #[default]
    Grid,
    /// Compact swatch and "label [symbol]" lines under each cluster title.
    List,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    Regular,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub text: String,
    /// Points.
    pub size: f32,
    pub font: Font,
    pub align: Align,
    /// Millimetres moved down after the line.
    pub advance: f32,
}

impl TextLine {
    fn new(text: impl Into<String>, size: f32, font: Font, advance: f32) -> Self {
        Self {
            text: text.into(),
            size,
            font,
            align: Align::Left,
            advance,
        }
    }

    fn aligned(mut self, align: Align) -> Self {
        self.align = align;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RatingRow {
    /// Short label in the list layout, full title in the grid.
    pub label: String,
    pub level: RatingLevel,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// Lines kept together on one page.
    Text(Vec<TextLine>),
    Legend,
    TableHeader,
    /// One cluster and its rows; never split across pages.
    ClusterGroup {
        title: String,
        rows: Vec<RatingRow>,
        layout: PdfLayout,
    },
    /// Free text; may continue on the next page line by line.
    Paragraph { title: String, body: String },
    /// Pinned near the bottom of the last page.
    Signature,
}

pub fn criteria_line() -> String {
    let rated: Vec<String> = LEVELS
        .iter()
        .filter(|l| !l.symbol.is_empty())
        .map(|l| format!("{}-{}", l.symbol, l.short_label))
        .collect();
    format!("Critères d'évaluation : {}", rated.join(", "))
}

pub fn describe(input: &ReportInput, layout: PdfLayout) -> Vec<Block> {
    let mut blocks = Vec::new();

    blocks.push(Block::Text(vec![
        TextLine::new("Document de suivi et d'évaluation :", 12.0, Font::Bold, 6.0),
        TextLine::new(
            "Situations de travail spécifiées et réalisées en milieu professionnel",
            12.0,
            Font::Bold,
            15.0,
        ),
    ]));
    blocks.push(Block::Text(vec![TextLine::new(
        format!("PFMP N° {}", input.period.name),
        16.0,
        Font::Bold,
        10.0,
    )
    .aligned(Align::Center)]));
    blocks.push(Block::Text(vec![TextLine::new(
        format!(
            "Du {} au {}",
            format_date_fr(&input.period.start_date),
            format_date_fr(&input.period.end_date)
        ),
        10.0,
        Font::Regular,
        15.0,
    )
    .aligned(Align::Right)]));

    blocks.push(Block::Text(vec![
        TextLine::new("NOM, PRÉNOM DU CANDIDAT", 12.0, Font::Bold, 8.0),
        TextLine::new(
            format!(
                "{}–{}",
                input.student.last_name.to_uppercase(),
                input.student.first_name
            ),
            14.0,
            Font::Bold,
            10.0,
        ),
        TextLine::new(
            format!("Classe: {}", input.class_name()),
            10.0,
            Font::Regular,
            10.0,
        ),
    ]));

    if let Some(e) = &input.evaluation {
        let enterprise: Vec<TextLine> = [
            ("Entreprise", &e.company_name),
            ("Domaine d'activité", &e.activity_domain),
            ("Tuteur", &e.tutor_name),
        ]
        .into_iter()
        .filter_map(|(label, value)| {
            value
                .as_deref()
                .map(|v| TextLine::new(format!("{label}: {v}"), 10.0, Font::Regular, 5.0))
        })
        .collect();
        if !enterprise.is_empty() {
            blocks.push(Block::Text(enterprise));
        }
    }

    blocks.push(Block::Text(vec![
        TextLine::new(
            "ÉVALUATION DES COMPÉTENCES ACQUISES EN PFMP :",
            12.0,
            Font::Bold,
            10.0,
        ),
        TextLine::new(criteria_line(), 8.0, Font::Regular, 5.0),
    ]));
    blocks.push(Block::Legend);

    if layout == PdfLayout::Grid {
        blocks.push(Block::TableHeader);
    }
    let ratings = input.evaluation.as_ref().map(|e| &e.competences);
    for cluster in CLUSTERS.iter() {
        let rows = cluster
            .items
            .iter()
            .map(|sub| {
                let rating = ratings.and_then(|c| c.get(sub.key)).cloned().unwrap_or_default();
                RatingRow {
                    label: match layout {
                        PdfLayout::Grid => sub.title.to_string(),
                        PdfLayout::List => sub.short_label.to_string(),
                    },
                    level: rating.level,
                    comment: rating.comment,
                }
            })
            .collect();
        blocks.push(Block::ClusterGroup {
            title: cluster.report_title.to_string(),
            rows,
            layout,
        });
    }

    if let Some(e) = &input.evaluation {
        if !e.general_comment.trim().is_empty() {
            blocks.push(Block::Paragraph {
                title: "OBSERVATIONS :".into(),
                body: e.general_comment.clone(),
            });
        }
        if !e.recommendations.trim().is_empty() {
            blocks.push(Block::Paragraph {
                title: "RECOMMANDATIONS :".into(),
                body: e.recommendations.clone(),
            });
        }
    }

    blocks.push(Block::Signature);
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::fixtures;
    use crate::rubric::SUB_COMPETENCY_COUNT;

    fn rating_rows(blocks: &[Block]) -> usize {
        blocks
            .iter()
            .map(|b| match b {
                Block::ClusterGroup { rows, .. } => rows.len(),
                _ => 0,
            })
            .sum()
    }

    #[test]
    fn criteria_skip_the_unrated_level() {
        assert_eq!(
            criteria_line(),
            "Critères d'évaluation : 1-Non acquise, 2-En cours, 3-Partiellement acquise, 4-Acquise"
        );
    }

    #[test]
    fn blank_form_keeps_every_row() {
        let blocks = describe(&fixtures::dupont(None), PdfLayout::Grid);
        assert_eq!(rating_rows(&blocks), SUB_COMPETENCY_COUNT);
        assert_eq!(blocks.last(), Some(&Block::Signature));
        assert!(!blocks.iter().any(|b| matches!(b, Block::Paragraph { .. })));
    }

    #[test]
    fn list_layout_uses_short_labels_and_no_table_header() {
        let blocks = describe(&fixtures::scenario(), PdfLayout::List);
        assert!(!blocks.contains(&Block::TableHeader));
        let first = blocks.iter().find_map(|b| match b {
            Block::ClusterGroup { rows, .. } => rows.first(),
            _ => None,
        });
        let first = first.expect("a rating row");
        assert_eq!(first.label, "Collecter les données");
        assert_eq!(first.level, RatingLevel::Acquired);
    }

    #[test]
    fn general_comment_becomes_a_paragraph() {
        let blocks = describe(&fixtures::scenario(), PdfLayout::Grid);
        assert!(blocks.contains(&Block::Paragraph {
            title: "OBSERVATIONS :".into(),
            body: "Bon travail".into(),
        }));
    }
}
