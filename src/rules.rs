//! Built-in rule tables.
//!
//! Three vocabularies are kept apart on purpose: country-level reports use
//! short labels ("USA", "UK"), the collaboration matrix uses full country
//! names, and institution names have their own table. Order matters in
//! every table: the first matching rule wins.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::canon::{MatchStyle, RuleSet, RuleSpec};

pub fn country_rules() -> Vec<RuleSpec> {
    vec![
        RuleSpec::new(
            r"\bu\.?s\.?a\.?\b|\bu\.?s\.?\b|\bunited states( of america)?\b",
            "USA",
        ),
        RuleSpec::new(
            r"\bu\.?k\.?\b|\bunited kingdom\b|\bgreat britain\b|\bbritain\b|\bengland\b|\bscotland\b|\bwales\b|\bnorthern ireland\b",
            "UK",
        ),
        RuleSpec::new(r"\bpeople'?s republic of china\b|\bprc\b", "China"),
        RuleSpec::new(r"\bchina\b", "China").unless(r".*hong\s*kong"),
        RuleSpec::new(r"\bhong\s*kong(\s*sar)?(,\s*china)?\b", "Hong Kong"),
        RuleSpec::new(r"\btaiwan\b|republic of china", "Taiwan"),
        RuleSpec::new(r"\brepublic of korea\b", "South Korea"),
        RuleSpec::new(r"\bkorea\b", "South Korea").unless(r".*north"),
        RuleSpec::new(r"\bsouth korea\b", "South Korea"),
        RuleSpec::new(r"\bnorth korea\b|\bdprk\b", "North Korea"),
        RuleSpec::new(r"\buae\b|\bunited arab emirates\b", "United Arab Emirates"),
        RuleSpec::new(r"\bsaudi arabia\b|kingdom of saudi arabia", "Saudi Arabia"),
        RuleSpec::new(r"\bthe netherlands\b|\bholland\b|\bnetherlands\b", "Netherlands"),
        RuleSpec::new(r"\bczech republic\b|\bczechia\b", "Czechia"),
        RuleSpec::new(r"\brussian federation\b", "Russia"),
        RuleSpec::new(
            r"\bcôte d'ivoire\b|\bcote d'ivoire\b|\bivory coast\b",
            "Côte d\u{2019}Ivoire",
        ),
        RuleSpec::new(r"\bglobal\b|\bworldwide\b|\binternational\b", "Global"),
    ]
}

pub fn region_rules() -> Vec<RuleSpec> {
    vec![
        RuleSpec::new(
            r"us|u\.s\.?|usa|u\.s\.a\.?|united states( of america)?",
            "United States",
        ),
        RuleSpec::new(
            r"uk|u\.k\.?|britain|great britain|united kingdom|england|scotland|wales|northern ireland",
            "United Kingdom",
        ),
        RuleSpec::new(r"uae|united arab emirates|emirates", "United Arab Emirates"),
        RuleSpec::new(
            r"south korea|republic of korea|korea,?\s*republic( of)?|korea",
            "Republic of Korea",
        ),
        RuleSpec::new(
            r"north korea|dprk|democratic people'?s republic of korea",
            "North Korea",
        ),
        RuleSpec::new(r"russia|russian federation", "Russia"),
        RuleSpec::new(r"czech republic|czechia", "Czechia"),
        RuleSpec::new(r"hong kong( sar)?", "Hong Kong"),
        RuleSpec::new(r"macau( sar)?", "Macau"),
        RuleSpec::new(r"prc|people'?s republic of china|mainland china|china", "China"),
        RuleSpec::new(r"roc|republic of china|taiwan", "Taiwan"),
        RuleSpec::new(r"turkiye|türkiye|turkey", "Türkiye"),
        RuleSpec::new(r"côte d'ivoire|cote d'ivoire|ivory coast", "Côte d\u{2019}Ivoire"),
    ]
}

pub fn institution_rules() -> Vec<RuleSpec> {
    let r = RuleSpec::new;
    vec![
        // US / UK / EU universities
        r(r"\bmit\b|massachusetts institute of technology", "MIT"),
        r(r"\bharvard\b", "Harvard University"),
        r(r"\bstanford\b", "Stanford University"),
        r(r"\buniversity college london\b|\bucl\b", "University College London"),
        r(r"\brutgers", "Rutgers University").unless(r"\s*business"),
        r(r"rutgers, the state university of new jersey", "Rutgers University"),
        r(r"\buniversity of pennsylvania\b|\bupenn\b", "University of Pennsylvania"),
        r(r"\buniversity of michigan\b", "University of Michigan"),
        r(r"\bmichigan state\b", "Michigan State University"),
        r(r"\bnorth carolina state\b", "North Carolina State University"),
        r(r"\bcarnegie mellon\b|\bcmu\b", "Carnegie Mellon University"),
        r(r"\bcolumbia\b", "Columbia University"),
        r(r"\bcornell\b", "Cornell University"),
        r(r"\byale\b", "Yale University"),
        r(r"\buniversity of washington", "University of Washington").unless(r"\s*bothell"),
        r(r"\buniversity of washington bothell\b", "University of Washington Bothell"),
        r(r"\buniversity of southern california\b|\busc\b", "University of Southern California"),
        r(r"\buniversity of virginia\b", "University of Virginia"),
        r(r"\buniversity of arizona\b", "University of Arizona"),
        r(r"\buniversity of utah\b", "University of Utah"),
        r(r"\buniversity of georgia\b", "University of Georgia"),
        r(r"\buniversity of illinois chicago\b", "University of Illinois Chicago"),
        r(r"\buniversity of minnesota", "University of Minnesota").unless(r", duluth"),
        r(r"\buniversity of minnesota,\s*duluth\b", "University of Minnesota Duluth"),
        r(r"\bqueen'?s university\b", "Queen's University"),
        r(r"\bgeorge washington university\b", "George Washington University"),
        // UC campuses
        r(r"\bucla\b|\buniversity of california,\s*los angeles\b", "UCLA"),
        r(r"\buc berkeley\b|\buniversity of california,\s*berkeley\b", "UC Berkeley"),
        r(r"\buniversity of california,\s*riverside\b", "UC Riverside"),
        // Europe
        r(r"\buniversity of oxford\b|\boxford university\b|\boxford\b", "University of Oxford"),
        r(
            r"\buniversity of cambridge\b|\bcambridge university\b|\bcambridge\b",
            "University of Cambridge",
        ),
        r(r"\bimperial college london\b", "Imperial College London"),
        r(r"\brwth aachen\b", "RWTH Aachen University"),
        r(r"\btechnische universität berlin\b|\btu berlin\b", "Technische Universität Berlin"),
        r(r"\bcharit[eé]\b.*universitätsmedizin berlin", "Charité - Universitätsmedizin Berlin"),
        r(r"\buniversity college dublin\b", "University College Dublin"),
        r(r"\bthe alan turing institute\b", "The Alan Turing Institute"),
        r(
            r"\btib leibniz information centre",
            "TIB Leibniz Information Centre for Science and Technology",
        ),
        r(
            r"\bl3s research center.*leibniz university hannover\b",
            "L3S Research Center & Leibniz University Hannover",
        ),
        r(r"\bipvs, universität stuttgart\b|\buniversität stuttgart\b", "University of Stuttgart"),
        r(r"\bgesis\b.*social sciences", "GESIS Leibniz Institute for the Social Sciences"),
        r(r"\b[ée]cole polytechnique\b", "École Polytechnique"),
        r(
            r"\bvienna university of economics and business\b",
            "Vienna University of Economics and Business",
        ),
        r(r"\buniversity of portsmouth\b", "University of Portsmouth"),
        r(r"\bleiden university medical center\b", "Leiden University Medical Center"),
        r(r"\buniversity hospital of zurich\b", "University Hospital of Zurich"),
        r(r"\buniversity of zurich\b", "University of Zurich"),
        r(r"\bzurich university of applied sciences\b", "Zurich University of Applied Sciences"),
        r(
            r"\bheinrich-heine-universit[aä]t d[üu]sseldorf\b",
            "Heinrich-Heine-Universität Düsseldorf",
        ),
        r(
            r"\binstitute for legal informatics, leibniz university of hanover\b",
            "Leibniz University Hannover",
        ),
        r(r"\binstitute of computer science, forth-ics\b", "FORTH-ICS"),
        r(r"\binnovation lab, schu[aä]fa holding ag\b", "SCHUFA Holding AG"),
        r(
            r"\binformation technologies institute, certh\b|\bcerth\b",
            "CERTH - Information Technologies Institute",
        ),
        r(
            r"\buniversit[eé] de toulouse\b|\binstitut de math[eé]matiques de toulouse\b",
            "Université de Toulouse",
        ),
        r(r"\buniversity of southampton\b", "University of Southampton"),
        // Asia
        r(r"\btsinghua university\b", "Tsinghua University"),
        r(r"\bpeking university\b", "Peking University"),
        r(r"\bfudan university\b", "Fudan University"),
        r(r"\bshanghai jiao tong university\b", "Shanghai Jiao Tong University"),
        r(r"\bzhejiang university\b", "Zhejiang University"),
        r(r"\bnational taiwan university\b", "National Taiwan University"),
        r(r"\buniversity of hong kong\b", "University of Hong Kong"),
        r(
            r"\bhong kong university of science and technology \((guangzhou|gz)\)|\bhkust\b|\bthe hong kong university of science and technology\b",
            "The Hong Kong University of Science and Technology",
        ),
        r(r"\bthe hong kong polytechnic university\b", "The Hong Kong Polytechnic University"),
        r(r"\bcity university of hong kong\b", "City University of Hong Kong"),
        r(r"\bzhongguancun laboratory\b", "Zhongguancun Laboratory"),
        r(
            r"\bharbin institute of technology, shenzhen\b",
            "Harbin Institute of Technology, Shenzhen",
        ),
        r(
            r"\bmoe key laboratory of high confidence software technologies\b",
            "MOE Key Laboratory of High Confidence Software Technologies",
        ),
        r(r"\bwestlake university\b", "Westlake University"),
        r(r"\byen[gk]se?i university\b|\byonsei university\b", "Yonsei University"),
        r(r"\bkaist\b|\bkorea advanced institute of science and technology\b", "KAIST"),
        r(r"\bjilin university\b", "Jilin University"),
        r(r"\brenmin university\b", "Renmin University of China"),
        // Australia / NZ and others
        r(r"\bunsw sydney\b", "UNSW Sydney"),
        r(r"\buniversity of technology sydney\b", "University of Technology Sydney"),
        r(r"\buniversity of wollongong\b", "University of Wollongong"),
        r(r"\bswansea university\b", "Swansea University"),
        r(r"\bunited arab emirates university\b", "United Arab Emirates University"),
        // Hospitals and health organizations
        r(r"\bbrigham and women'?s hospital\b", "Brigham and Women's Hospital"),
        r(r"\bmassachusetts general hospital\b", "Massachusetts General Hospital"),
        r(r"\bnorthwestern university\b", "Northwestern University"),
        r(r"\bmayo clinic\b", "Mayo Clinic"),
        r(r"\bmedical university of graz\b", "Medical University of Graz"),
        r(r"\buniversity hospital carl gustav carus\b", "University Hospital Carl Gustav Carus"),
        r(
            r"\bcenter for devices and radiological health\b",
            "Center for Devices and Radiological Health",
        ),
        r(
            r"\bfraunhofer institute for digital medicine\b",
            "Fraunhofer Institute for Digital Medicine",
        ),
        r(r"\btampere university\b", "Tampere University"),
        r(r"\bst\.?\s*helena hospital\b", "St. Helena Hospital"),
        r(
            r"\bst\.?\s*luke'?s international university\b",
            "St. Luke's International University",
        ),
        r(r"\bkaiser permanente\b", "Kaiser Permanente"),
        // Companies and labs
        r(r"\bgoogle research\b", "Google Research"),
        r(r"\bgoogle\b", "Google"),
        r(r"\bibm research\s*-?\s*india\b", "IBM Research India"),
        r(r"\bibm research\b", "IBM Research"),
        r(r"\bmicrosoft research\b", "Microsoft Research"),
        r(r"\bmicrosoft \((united states|canada)\)", "Microsoft"),
        r(r"\bamazon aws ai\b", "Amazon AWS AI"),
        r(r"\bamazon\b", "Amazon"),
        r(r"\badobe research\b", "Adobe Research"),
        r(r"\badobe systems\b", "Adobe"),
        r(r"\bdeepmind\b", "DeepMind"),
        r(r"\balibaba\b", "Alibaba"),
        r(r"\bant group\b", "Ant Group"),
        r(r"\bintel\b", "Intel"),
        r(r"\btwitter\b", "Twitter"),
        r(r"\btencent\b", "Tencent"),
        r(r"\bhuawei noah'?s ark lab\b|\bhuawei\b", "Huawei"),
        r(r"\barista\b", "Arista"),
        r(r"\bolympus\b", "Olympus"),
        r(r"\bopen knowledge\b", "Open Knowledge Foundation"),
        // Institutes and faculties
        r(
            r"\bknowledge media institute, the open university\b|\bthe open university\b",
            "The Open University",
        ),
        r(r"\blaboratoire hubert curien\b", "Laboratoire Hubert Curien"),
        r(r"\binstitut polytechnique de paris\b", "Institut Polytechnique de Paris"),
        r(
            r"\bamsterdam university medical centers\b|\bamsterdam umc\b",
            "Amsterdam University Medical Centers",
        ),
        r(
            r"\bdepartment of cognitive and brain sciences, hebrew university\b|\bfedermann center.*hebrew university\b",
            "Hebrew University of Jerusalem",
        ),
        r(
            r"\bfaculty of data and decision sciences, technion\b|\btechnion\b",
            "Technion - Israel Institute of Technology",
        ),
        r(
            r"\bkddlab,? dipartimento di informatica, universit[aà] di pisa\b|\buniversity of pisa\b",
            "University of Pisa",
        ),
        r(
            r"\binstitut[oe] de matem[aá]ticas.*valladolid\b|\buniversity of valladolid\b",
            "University of Valladolid",
        ),
        r(r"\binstitut[oe] de matem[aá]ticas.*toulouse\b", "Université de Toulouse"),
        r(r"\baalborg university\b", "Aalborg University"),
        r(r"\bhaverford college\b", "Haverford College"),
        r(r"\bwestern university\b", "Western University"),
        r(r"\buniversity of rochester\b", "University of Rochester"),
        r(r"\buniversity of cagliari\b", "University of Cagliari"),
        r(r"\bmacquarie university\b", "Macquarie University"),
        r(r"\by[ıi]ld[ıi]z technical university\b", "Yıldız Technical University"),
        r(r"\bbennett university\b", "Bennett University"),
        r(r"\bcmr university\b", "CMR University"),
        r(r"\bcape breton university\b", "Cape Breton University"),
        r(r"\bcardiovascular institute of the south\b", "Cardiovascular Institute of the South"),
        r(r"\bthe chinese university of hong kong\b", "The Chinese University of Hong Kong"),
        r(r"\buniversity of central florida\b", "University of Central Florida"),
        r(r"\buniversity of notre dame\b", "University of Notre Dame"),
        r(r"\buniversity of padua\b", "University of Padua"),
        r(r"\buniversity of waterloo\b", "University of Waterloo"),
        r(r"\buniversity of victoria\b", "University of Victoria"),
    ]
}

/// Optional overrides read from a JSON rules file. A table present in the
/// file replaces the built-in table of the same name.
#[derive(Debug, Default, Deserialize)]
pub struct RulesFile {
    #[serde(default)]
    pub country: Option<Vec<RuleSpec>>,
    #[serde(default)]
    pub region: Option<Vec<RuleSpec>>,
    #[serde(default)]
    pub institution: Option<Vec<RuleSpec>>,
}

impl RulesFile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read rules file: {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse rules file: {}", path.display()))
    }
}

/// The three compiled vocabularies used by the reports.
#[derive(Debug)]
pub struct Canonicalizers {
    pub country: RuleSet,
    pub region: RuleSet,
    pub institution: RuleSet,
}

impl Canonicalizers {
    pub fn builtin() -> Result<Self> {
        Self::with_overrides(RulesFile::default())
    }

    pub fn with_overrides(overrides: RulesFile) -> Result<Self> {
        let country = overrides.country.unwrap_or_else(country_rules);
        let region = overrides.region.unwrap_or_else(region_rules);
        let institution = overrides.institution.unwrap_or_else(institution_rules);
        Ok(Self {
            country: RuleSet::compile("country", MatchStyle::Search, &country)?,
            region: RuleSet::compile("region", MatchStyle::Anchored, &region)?,
            institution: RuleSet::compile("institution", MatchStyle::Search, &institution)?
                .with_country_qualifier_stripping(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sets() -> Canonicalizers {
        Canonicalizers::builtin().unwrap()
    }

    #[test]
    fn builtin_tables_compile() {
        let c = sets();
        assert_eq!(c.country.len(), country_rules().len());
        assert_eq!(c.region.len(), region_rules().len());
        assert_eq!(c.institution.len(), institution_rules().len());
    }

    #[test]
    fn country_table_short_labels() {
        let c = sets();
        let cases = [
            ("United States of America", "USA"),
            ("U.S.", "USA"),
            ("england", "UK"),
            ("People's Republic of China", "China"),
            ("Hong Kong SAR", "Hong Kong"),
            ("China, Hong Kong SAR", "Hong Kong"),
            ("Hong Kong SAR, China", "China"),
            ("Hong Kong, China", "China"),
            ("Taiwan", "Taiwan"),
            ("Korea", "South Korea"),
            ("DPRK", "North Korea"),
            ("North Korea", "South Korea"),
            ("Democratic People's Republic of Korea", "South Korea"),
            ("The Netherlands", "Netherlands"),
            ("Russian Federation", "Russia"),
            ("Cote d\u{2019}Ivoire", "Côte d\u{2019}Ivoire"),
            ("Worldwide", "Global"),
        ];
        for (raw, want) in cases {
            assert_eq!(c.country.canonicalize(raw).as_deref(), Some(want), "input {:?}", raw);
        }
    }

    #[test]
    fn country_table_follows_rule_order() {
        let c = sets();
        // "republic of china" also names Taiwan, but the China rule comes first.
        assert_eq!(c.country.canonicalize("Republic of China").as_deref(), Some("China"));
        // "wales" is a UK constituent, so this is claimed by the UK rule.
        assert_eq!(c.country.canonicalize("New South Wales").as_deref(), Some("UK"));
    }

    #[test]
    fn country_table_identity_fallback() {
        let c = sets();
        // The broad Korea rule rejects a later "north"; no other rule claims it.
        assert_eq!(c.country.canonicalize("Korea, North").as_deref(), Some("Korea, North"));
        assert_eq!(c.country.canonicalize("Canada").as_deref(), Some("Canada"));
        assert_eq!(c.country.canonicalize("russia").as_deref(), Some("russia"));
    }

    #[test]
    fn region_table_full_names() {
        let c = sets();
        let cases = [
            ("USA", "United States"),
            ("U.S.A.", "United States"),
            ("UK", "United Kingdom"),
            ("Korea, Republic of", "Republic of Korea"),
            ("DPRK", "North Korea"),
            ("Mainland China", "China"),
            ("ROC", "Taiwan"),
            ("Turkey", "Türkiye"),
        ];
        for (raw, want) in cases {
            assert_eq!(c.region.canonicalize(raw).as_deref(), Some(want), "input {:?}", raw);
        }
        // Anchored: qualifiers keep the string out of the table.
        assert_eq!(c.region.canonicalize("Boston, USA").as_deref(), Some("Boston, USA"));
    }

    #[test]
    fn institution_table_examples() {
        let c = sets();
        let cases = [
            ("Massachusetts Institute of Technology", "MIT"),
            ("Rutgers, The State University of New Jersey", "Rutgers University"),
            ("University of Washington Bothell", "University of Washington Bothell"),
            ("University of Washington, Seattle", "University of Washington"),
            ("University of Minnesota, Duluth", "University of Minnesota Duluth"),
            ("Google Research (United States)", "Google Research"),
            ("IBM Research - India", "IBM Research India"),
            ("Microsoft (Canada)", "Microsoft"),
            ("Charité – Universitätsmedizin Berlin", "Charité - Universitätsmedizin Berlin"),
        ];
        for (raw, want) in cases {
            assert_eq!(
                c.institution.canonicalize(raw).as_deref(),
                Some(want),
                "input {:?}",
                raw
            );
        }
        assert_eq!(
            c.institution.resolve("Rutgers Business School"),
            crate::canon::Resolution::Unmapped("Rutgers Business School".to_string())
        );
    }

    #[test]
    fn canonicalize_is_idempotent_on_labels() {
        let c = sets();
        for set in [&c.country, &c.region, &c.institution] {
            for label in set.labels() {
                let once = set.canonicalize(label);
                let twice = once.as_deref().and_then(|s| set.canonicalize(s));
                assert_eq!(once, twice, "set {} label {:?}", set.name(), label);
            }
        }
    }

    #[test]
    fn rules_file_overrides_one_table() {
        let file: RulesFile = serde_json::from_str(
            r#"{"country": [{"pattern": "\\bfrance\\b", "label": "France"},
                            {"pattern": "\\beire\\b", "unless": ".*north", "label": "Ireland"}]}"#,
        )
        .unwrap();
        let c = Canonicalizers::with_overrides(file).unwrap();
        assert_eq!(c.country.len(), 2);
        assert_eq!(c.country.canonicalize("Paris, France").as_deref(), Some("France"));
        assert_eq!(c.country.canonicalize("USA").as_deref(), Some("USA"));
        assert_eq!(c.country.canonicalize("Eire").as_deref(), Some("Ireland"));
        assert_eq!(c.country.canonicalize("Eire (north)").as_deref(), Some("Eire (north)"));
        assert_eq!(c.region.len(), region_rules().len());
    }
}
