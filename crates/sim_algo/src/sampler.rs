//! Demographic persona sampling.
//!
//! Personas are drawn directly from per-district census distributions; voting
//! parameters (turnout probability, ideology, engagement, swing) are derived
//! from the sampled attributes by fixed rules. Sampling for each district runs
//! on its own scoped RNG stream, so districts are reproducible independently
//! of processing order.

use sim_core::entities::{
    AgeBand, AgeGroup, District, EducationLevel, Engagement, Gender, HouseholdType, Ideology,
    IncomeBracket, IndustrySector, PartyAffinity, Persona, SwingLevel, Urbanization,
};
use sim_core::ids::{PartyId, PersonaId};
use sim_core::params::SimParams;
use sim_core::rng::SimRng;

/* ---------------------------- attribute pools ---------------------------- */

fn occupation_pool(sector: IndustrySector, group: AgeGroup) -> &'static [&'static str] {
    use AgeGroup::*;
    use IndustrySector::*;
    match (sector, group) {
        (Primary, Young) => &["farm worker", "dairy worker", "fishery worker", "forestry worker"],
        (Primary, Middle) => &["farm owner", "dairy farm operator", "fishing boat captain", "forestry operator"],
        (Primary, Senior) => &["part-time farmer", "farm owner", "fishery worker"],
        (Secondary, Young) => &["factory worker", "construction worker", "electronics assembler", "auto plant worker"],
        (Secondary, Middle) => &["plant supervisor", "construction manager", "manufacturing engineer", "quality inspector"],
        (Secondary, Senior) => &["part-time factory worker", "retired tradesperson"],
        (Tertiary, Young) => &[
            "software developer", "sales representative", "office clerk", "retail clerk",
            "restaurant worker", "care worker", "nurse", "freelancer",
        ],
        (Tertiary, Middle) => &[
            "middle manager", "sales representative", "civil servant", "teacher",
            "healthcare worker", "consultant", "small business owner", "real estate agent",
        ],
        (Tertiary, Senior) => &["pensioner", "silver-center worker", "part-timer", "care home worker"],
    }
}

const STUDENT_OCCUPATIONS: &[&str] = &["university student", "graduate student"];

fn concerns_for(group: AgeGroup) -> &'static [&'static str] {
    match group {
        AgeGroup::Young => &["jobs and wages", "cost of living", "education and childcare", "online platform rules"],
        AgeGroup::Middle => &["cost of living", "social security", "education and childcare", "tax reform", "economic growth"],
        AgeGroup::Senior => &["pensions", "health and elder care", "social security", "disaster preparedness", "regional revival"],
    }
}

fn info_sources_for(group: AgeGroup) -> &'static [&'static str] {
    match group {
        AgeGroup::Young => &["social media", "video platforms", "online news"],
        AgeGroup::Middle => &["television", "online news", "newspapers", "social media"],
        AgeGroup::Senior => &["television", "newspapers", "community groups", "radio"],
    }
}

/// Individual income-bracket distribution derived from the district's income
/// classification, aligned with `IncomeBracket::ALL` (low, middle, high).
fn income_dist(level: IncomeBracket) -> [f64; 3] {
    match level {
        IncomeBracket::High => [0.15, 0.40, 0.45],
        IncomeBracket::Middle => [0.30, 0.50, 0.20],
        IncomeBracket::Low => [0.60, 0.30, 0.10],
    }
}

/// Education distribution from the university rate, aligned with
/// `EducationLevel::ALL` (secondary, vocational, university).
fn education_dist(university_rate: f64) -> [f64; 3] {
    let univ = university_rate.clamp(0.0, 1.0);
    let vocational = ((1.0 - univ) * 0.30).min(0.20);
    let secondary = (1.0 - univ - vocational).max(0.0);
    [secondary, vocational, univ]
}

/* ---------------------------- derived parameters ---------------------------- */

/// Rule-based turnout probability, clamped to [0.05, 0.95].
fn turnout_probability(
    age: u8,
    education: EducationLevel,
    income: IncomeBracket,
    sector: IndustrySector,
    urbanization: Urbanization,
    weather_modifier: f64,
    turnout_boost: f64,
) -> f64 {
    let mut base = match age {
        0..=29 => 0.35,
        30..=39 => 0.50,
        40..=49 => 0.55,
        50..=59 => 0.60,
        60..=69 => 0.70,
        70..=74 => 0.75,
        _ => 0.65,
    };
    if education == EducationLevel::University {
        base += 0.05;
    }
    match income {
        IncomeBracket::Low => base -= 0.10,
        IncomeBracket::High => base += 0.05,
        IncomeBracket::Middle => {}
    }
    if sector == IndustrySector::Primary {
        base += 0.05;
    }
    if urbanization == Urbanization::Metropolis {
        base -= 0.03;
    }
    base += weather_modifier + turnout_boost;
    base.clamp(0.05, 0.95)
}

fn sample_ideology(
    age: u8,
    sector: IndustrySector,
    education: EducationLevel,
    income: IncomeBracket,
    rng: &mut SimRng,
) -> Ideology {
    // Aligned with Ideology::ALL: conservative, centrist, progressive, apathetic.
    let mut probs: [f64; 4] = [0.30, 0.35, 0.25, 0.10];
    if age <= 29 {
        probs[2] += 0.10;
        probs[3] += 0.10;
        probs[0] -= 0.10;
    } else if age >= 65 {
        probs[0] += 0.15;
        probs[2] -= 0.10;
    }
    match sector {
        IndustrySector::Primary => {
            probs[0] += 0.15;
            probs[2] -= 0.10;
        }
        IndustrySector::Tertiary => probs[2] += 0.05,
        IndustrySector::Secondary => {}
    }
    if education == EducationLevel::University {
        probs[2] += 0.05;
        probs[3] -= 0.05;
    }
    match income {
        IncomeBracket::Low => probs[2] += 0.05,
        IncomeBracket::High => probs[0] += 0.05,
        IncomeBracket::Middle => {}
    }
    for p in &mut probs {
        *p = p.max(0.01);
    }
    let ix = rng.weighted_choice(&probs).expect("probs floored above zero");
    Ideology::ALL[ix]
}

fn sample_engagement(age: u8, education: EducationLevel, rng: &mut SimRng) -> Engagement {
    // Aligned with Engagement::ALL: low, moderate, high.
    let mut probs: [f64; 3] = [0.30, 0.45, 0.25];
    if age >= 60 {
        probs[2] += 0.15;
        probs[0] -= 0.10;
    } else if age <= 29 {
        probs[0] += 0.15;
        probs[2] -= 0.10;
    }
    if education == EducationLevel::University {
        probs[2] += 0.05;
        probs[0] -= 0.05;
    }
    for p in &mut probs {
        *p = p.max(0.01);
    }
    let ix = rng.weighted_choice(&probs).expect("probs floored above zero");
    Engagement::ALL[ix]
}

/// Volatility category from affinity and engagement: committed partisans sit
/// low, undecided voters high, and engagement shifts the level one step.
fn derive_swing(affinity: &PartyAffinity, engagement: Engagement) -> SwingLevel {
    let base = match affinity {
        PartyAffinity::Party(_) => SwingLevel::Low,
        PartyAffinity::Undecided => SwingLevel::High,
    };
    match engagement {
        Engagement::High => base.step_down(),
        Engagement::Moderate => base,
        Engagement::Low => base.step_up(),
    }
}

/* ---------------------------- sampling ---------------------------- */

/// Generate `params.personas_per_district` personas for one district.
pub fn sample_district_personas(
    district: &District,
    params: &SimParams,
    weather_modifier: f64,
) -> Vec<Persona> {
    let mut rng = SimRng::for_scope(params.seed, district.id.as_str());

    // Affinity choice set: parties in id order, undecided last.
    let parties: Vec<&PartyId> = district.party_support.keys().collect();
    let mut affinity_weights: Vec<f64> = district.party_support.values().copied().collect();
    affinity_weights.push(district.floating_ratio);

    let income_weights = income_dist(district.income_level);
    let edu_weights = education_dist(district.university_rate);

    let mut personas = Vec::with_capacity(params.personas_per_district as usize);
    for i in 0..params.personas_per_district {
        let band = rng
            .weighted_choice(&district.age_bands)
            .map(|ix| AgeBand::ALL[ix])
            .unwrap_or(AgeBand::From40To49);
        let (lo, hi) = band.range();
        let age = rng.range_inclusive(lo as u64, hi as u64) as u8;
        let group = AgeGroup::of(age);

        let gender = if rng.next_f64() < district.male_ratio {
            Gender::Male
        } else {
            Gender::Female
        };

        let sector = rng
            .weighted_choice(&district.industry)
            .map(|ix| IndustrySector::ALL[ix])
            .unwrap_or(IndustrySector::Tertiary);

        let occupation = if age <= 25 && rng.next_f64() < district.university_rate * 0.6 {
            rng.choose(STUDENT_OCCUPATIONS)
        } else {
            rng.choose(occupation_pool(sector, group))
        }
        .copied()
        .unwrap_or("company employee")
        .to_string();

        let household = rng
            .weighted_choice(&district.households)
            .map(|ix| HouseholdType::ALL[ix])
            .unwrap_or(HouseholdType::NuclearFamily);

        let income = rng
            .weighted_choice(&income_weights)
            .map(|ix| IncomeBracket::ALL[ix])
            .unwrap_or(IncomeBracket::Middle);

        let education = rng
            .weighted_choice(&edu_weights)
            .map(|ix| EducationLevel::ALL[ix])
            .unwrap_or(EducationLevel::Secondary);

        let turnout = turnout_probability(
            age,
            education,
            income,
            sector,
            district.urbanization,
            weather_modifier,
            params.turnout_boost,
        );

        let ideology = sample_ideology(age, sector, education, income, &mut rng);
        let engagement = sample_engagement(age, education, &mut rng);

        let affinity = match rng.weighted_choice(&affinity_weights) {
            Some(ix) if ix < parties.len() => PartyAffinity::Party(parties[ix].clone()),
            _ => PartyAffinity::Undecided,
        };
        let swing = derive_swing(&affinity, engagement);

        // Two regional issues plus two age-band concerns, deduplicated in
        // encounter order, shuffled, first four kept.
        let mut concerns: Vec<String> = Vec::new();
        for c in district.regional_issues.iter().take(2) {
            if !concerns.contains(c) {
                concerns.push(c.clone());
            }
        }
        for c in concerns_for(group).iter().take(2) {
            let c = c.to_string();
            if !concerns.contains(&c) {
                concerns.push(c);
            }
        }
        rng.shuffle(&mut concerns);
        concerns.truncate(4);

        personas.push(Persona {
            id: PersonaId::new(&district.id, i + 1),
            district: district.id.clone(),
            age,
            gender,
            occupation,
            sector,
            household,
            income,
            education,
            urbanization: district.urbanization,
            ideology,
            engagement,
            affinity,
            swing,
            turnout_probability: (turnout * 1000.0).round() / 1000.0,
            concerns,
            info_sources: info_sources_for(group)
                .iter()
                .map(|s| s.to_string())
                .collect(),
        });
    }
    personas
}
