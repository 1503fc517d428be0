//! The competency rubric: rating levels and the fixed cluster layout.
//!
//! This is the single table the editor, the PDF renderer and the spreadsheet
//! renderer all read. Adding a level or a sub-competency is an edit here only.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::json;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum RatingLevel {
    #[default]
    #[serde(rename = "non_evaluee")]
    Unrated,
    #[serde(rename = "non_acquise")]
    NotAcquired,
    #[serde(rename = "en_cours")]
    InProgress,
    #[serde(rename = "partiellement_acquise")]
    PartiallyAcquired,
    #[serde(rename = "acquise")]
    Acquired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelInfo {
    pub level: RatingLevel,
    pub wire: &'static str,
    pub label: &'static str,
    pub short_label: &'static str,
    pub color: &'static str,
    pub rgb: (u8, u8, u8),
    pub symbol: &'static str,
}

pub const LEVELS: [LevelInfo; 5] = [
    LevelInfo {
        level: RatingLevel::Unrated,
        wire: "non_evaluee",
        label: "Non évaluée",
        short_label: "Non évaluée",
        color: "#c8c8c8",
        rgb: (200, 200, 200),
        symbol: "",
    },
    LevelInfo {
        level: RatingLevel::NotAcquired,
        wire: "non_acquise",
        label: "Non acquise",
        short_label: "Non acquise",
        color: "#ff4444",
        rgb: (255, 68, 68),
        symbol: "1",
    },
    LevelInfo {
        level: RatingLevel::InProgress,
        wire: "en_cours",
        label: "En cours d'acquisition",
        short_label: "En cours",
        color: "#ff8800",
        rgb: (255, 136, 0),
        symbol: "2",
    },
    LevelInfo {
        level: RatingLevel::PartiallyAcquired,
        wire: "partiellement_acquise",
        label: "Partiellement acquise",
        short_label: "Partiellement acquise",
        color: "#ffaa00",
        rgb: (255, 170, 0),
        symbol: "3",
    },
    LevelInfo {
        level: RatingLevel::Acquired,
        wire: "acquise",
        label: "Acquise",
        short_label: "Acquise",
        color: "#00aa44",
        rgb: (0, 170, 68),
        symbol: "4",
    },
];

impl RatingLevel {
    pub const ALL: [RatingLevel; 5] = [
        RatingLevel::Unrated,
        RatingLevel::NotAcquired,
        RatingLevel::InProgress,
        RatingLevel::PartiallyAcquired,
        RatingLevel::Acquired,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn info(self) -> &'static LevelInfo {
        &LEVELS[self.index()]
    }

    pub fn symbol(self) -> &'static str {
        self.info().symbol
    }

    pub fn color(self) -> &'static str {
        self.info().color
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        LEVELS.iter().find(|l| l.wire == s).map(|l| l.level)
    }

    pub fn from_symbol(s: &str) -> Option<Self> {
        LEVELS.iter().find(|l| l.symbol == s).map(|l| l.level)
    }

    pub fn from_color(s: &str) -> Option<Self> {
        LEVELS
            .iter()
            .find(|l| l.color.eq_ignore_ascii_case(s))
            .map(|l| l.level)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SubCompetency {
    pub key: &'static str,
    pub title: &'static str,
    pub short_label: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct Cluster {
    pub code: &'static str,
    pub title: &'static str,
    /// Label used in the report table and in the PDF list layout.
    pub report_title: &'static str,
    /// Label used in the spreadsheet's first column.
    pub sheet_label: &'static str,
    pub items: &'static [SubCompetency],
}

pub const CLUSTERS: [Cluster; 7] = [
    Cluster {
        code: "CC1",
        title: "CC1 - S'informer sur l'intervention ou la réalisation",
        report_title: "CC1 - S'informer sur l'intervention",
        sheet_label: "CC1 - S'informer",
        items: &[SubCompetency {
            key: "cc1_collecter_donnees",
            title: "Collecter les données nécessaires à l'intervention ou à la réalisation en utilisant les outils numériques",
            short_label: "Collecter les données",
        }],
    },
    Cluster {
        code: "CC2",
        title: "CC2 - Organiser la réalisation ou l'intervention",
        report_title: "CC2 - Organiser la réalisation",
        sheet_label: "CC2 - Organiser",
        items: &[
            SubCompetency {
                key: "cc2_ordonner_donnees",
                title: "Ordonner les données nécessaires à l'intervention ou à la réalisation en tenant compte des interactions avec les autres intervenants",
                short_label: "Ordonner les données",
            },
            SubCompetency {
                key: "cc2_reperer_contraintes",
                title: "Repérer les contraintes liées à l'efficacité énergétique",
                short_label: "Repérer les contraintes",
            },
        ],
    },
    Cluster {
        code: "CC3",
        title: "CC3 - Analyser et exploiter les données",
        report_title: "CC3 - Analyser et exploiter les données",
        sheet_label: "CC3 - Analyser",
        items: &[
            SubCompetency {
                key: "cc3_identifier_elements",
                title: "Identifier les éléments d'un système énergétique, de son installation électrique et de son environnement numérique",
                short_label: "Identifier les éléments",
            },
            SubCompetency {
                key: "cc3_identifier_grandeurs",
                title: "Identifier les grandeurs physiques nominales associées à l'installation (températures, pressions, puissances, intensités, tensions, ...)",
                short_label: "Identifier les grandeurs",
            },
            SubCompetency {
                key: "cc3_representer_installation",
                title: "Représenter tout ou partie d'une installation, manuellement ou avec un outil numérique",
                short_label: "Représenter l'installation",
            },
        ],
    },
    Cluster {
        code: "CC4",
        title: "CC4 - Réaliser une installation ou une intervention",
        report_title: "CC4 - Réaliser une installation",
        sheet_label: "CC4 - Réaliser",
        items: &[
            SubCompetency {
                key: "cc4_implanter_cabler",
                title: "Implanter, câbler, raccorder les matériels, les supports, les appareillages et les équipements d'interconnexion",
                short_label: "Implanter, câbler",
            },
            SubCompetency {
                key: "cc4_realiser_installation",
                title: "Réaliser l'installation et/ou les modifications des réseaux fluidiques et/ou les câblages électriques",
                short_label: "Réaliser l'installation",
            },
            SubCompetency {
                key: "cc4_operer_attitude",
                title: "Opérer avec une attitude écoresponsable",
                short_label: "Attitude écoresponsable",
            },
        ],
    },
    Cluster {
        code: "CC7",
        title: "CC7 - Établir un pré-diagnostic à distance",
        report_title: "CC7 - Établir un pré-diagnostic (MAINTENANCE)",
        sheet_label: "CC7 - Maintenance",
        items: &[
            SubCompetency {
                key: "cc7_controler_donnees",
                title: "Contrôler les données d'exploitation (indicateurs, voyants, ...) par rapport aux attendus",
                short_label: "Contrôler les données",
            },
            SubCompetency {
                key: "cc7_constater_defaillance",
                title: "Constater la défaillance",
                short_label: "Constater les défaillances",
            },
            SubCompetency {
                key: "cc7_lister_hypotheses",
                title: "Lister des hypothèses de panne(s) et/ou de dysfonctionnement(s)",
                short_label: "Lister les hypothèses",
            },
        ],
    },
    Cluster {
        code: "CC8",
        title: "CC8 - Renseigner les documents",
        report_title: "CC8 - Renseigner les documents (COMMUNICATION)",
        sheet_label: "CC8 - Communication",
        items: &[
            SubCompetency {
                key: "cc8_completer_documents",
                title: "Compléter les documents techniques et administratifs",
                short_label: "Compléter les documents",
            },
            SubCompetency {
                key: "cc8_expliquer_avancement",
                title: "Expliquer l'état d'avancement des opérations, leurs contraintes et leurs difficultés",
                short_label: "Expliquer l'avancement",
            },
            SubCompetency {
                key: "cc8_rediger_compte_rendu",
                title: "Rédiger un compte-rendu, un rapport d'activité",
                short_label: "Rédiger compte rendu",
            },
        ],
    },
    Cluster {
        code: "CC9",
        title: "CC9 - Communiquer avec le client et/ou l'usager",
        report_title: "CC9 - Communiquer avec le client et/ou l'usager",
        sheet_label: "CC9 - Client/Usager",
        items: &[
            SubCompetency {
                key: "cc9_interpreter_informations",
                title: "Interpréter les informations du client et/ou l'exploitant sur ses besoins",
                short_label: "Interpréter les informations",
            },
            SubCompetency {
                key: "cc9_expliquer_fonctionnement",
                title: "Expliquer le fonctionnement et l'utilisation de l'installation au client et/ou à l'exploitant",
                short_label: "Expliquer le fonctionnement",
            },
            SubCompetency {
                key: "cc9_informer_consignes",
                title: "Informer oralement des consignes de sécurité",
                short_label: "Informer sur les consignes",
            },
        ],
    },
];

pub const SUB_COMPETENCY_COUNT: usize = 18;

/// Sub-competencies in rubric order, paired with their cluster.
pub fn sub_competencies() -> impl Iterator<Item = (&'static Cluster, &'static SubCompetency)> {
    CLUSTERS
        .iter()
        .flat_map(|c| c.items.iter().map(move |s| (c, s)))
}

pub fn position_of(key: &str) -> Option<usize> {
    sub_competencies().position(|(_, s)| s.key == key)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetencyRating {
    #[serde(rename = "niveau", default)]
    pub level: RatingLevel,
    #[serde(rename = "commentaire", default)]
    pub comment: String,
}

/// The 18 ratings of one evaluation, stored in rubric order.
///
/// On the wire this is an object keyed by sub-competency key. Keys missing from
/// a stored document read as unrated; unknown keys are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Competences {
    ratings: [CompetencyRating; SUB_COMPETENCY_COUNT],
}

impl Competences {
    pub fn get(&self, key: &str) -> Option<&CompetencyRating> {
        position_of(key).map(|i| &self.ratings[i])
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut CompetencyRating> {
        position_of(key).map(move |i| &mut self.ratings[i])
    }

    pub fn set_level(&mut self, key: &str, level: RatingLevel) -> bool {
        match self.get_mut(key) {
            Some(r) => {
                r.level = level;
                true
            }
            None => false,
        }
    }

    pub fn iter(
        &self,
    ) -> impl Iterator<Item = (&'static Cluster, &'static SubCompetency, &CompetencyRating)> {
        sub_competencies()
            .zip(self.ratings.iter())
            .map(|((c, s), r)| (c, s, r))
    }

    pub fn level_counts(&self) -> [usize; 5] {
        let mut counts = [0usize; 5];
        for r in &self.ratings {
            counts[r.level.index()] += 1;
        }
        counts
    }
}

impl Serialize for Competences {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(SUB_COMPETENCY_COUNT))?;
        for (_, sub, rating) in self.iter() {
            map.serialize_entry(sub.key, rating)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Competences {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CompetencesVisitor;

        impl<'de> Visitor<'de> for CompetencesVisitor {
            type Value = Competences;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object keyed by sub-competency")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Competences, A::Error> {
                let mut out = Competences::default();
                while let Some(key) = access.next_key::<String>()? {
                    match position_of(&key) {
                        Some(i) => out.ratings[i] = access.next_value()?,
                        None => {
                            access.next_value::<serde::de::IgnoredAny>()?;
                        }
                    }
                }
                Ok(out)
            }
        }

        deserializer.deserialize_map(CompetencesVisitor)
    }
}

/// The rubric as the UI consumes it.
pub fn describe() -> serde_json::Value {
    let levels: Vec<_> = LEVELS
        .iter()
        .map(|l| {
            json!({
                "niveau": l.wire,
                "label": l.label,
                "shortLabel": l.short_label,
                "color": l.color,
                "symbol": l.symbol,
            })
        })
        .collect();
    let clusters: Vec<_> = CLUSTERS
        .iter()
        .map(|c| {
            json!({
                "code": c.code,
                "title": c.title,
                "items": c.items.iter().map(|s| json!({
                    "key": s.key,
                    "title": s.title,
                    "shortLabel": s.short_label,
                })).collect::<Vec<_>>(),
            })
        })
        .collect();
    json!({ "levels": levels, "clusters": clusters })
}
