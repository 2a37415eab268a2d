//! Body-composition estimation using the circumference-based ("Navy") method.
//!
//! Everything here is a pure function of its arguments. Missing or
//! out-of-domain inputs yield `None`, never an error: the caller simply omits
//! the derived field.

/// Height assumed when the owning profile has none (legacy single-user rows).
pub const DEFAULT_HEIGHT_CM: f64 = 185.0;
/// Sex assumed when the owning profile has none.
pub const DEFAULT_SEX: &str = "male";

/// Approximate share of body weight that is bone, organ and water mass.
const ESSENTIAL_MASS_FRACTION: f64 = 0.2;

const CM_PER_INCH: f64 = 2.54;

/// An inferred belly circumference.
///
/// `plausible` is false when the value falls below the neck circumference or
/// above 200 cm. The number is still returned; the bound is advisory and
/// callers may surface the value with a caveat.
#[derive(Debug, Clone, Copy)]
pub struct BellyEstimate {
    pub belly_cm: f64,
    pub plausible: bool,
}

/// Estimate body-fat percentage from raw measurements.
///
/// Requires weight, neck and belly; height falls back to
/// [`DEFAULT_HEIGHT_CM`] and sex to [`DEFAULT_SEX`]. The result is clamped to
/// [3, 50]. Returns `None` when a required input is missing or non-positive,
/// or when a logarithm argument would be non-positive.
#[must_use]
pub fn estimate_fat_percentage(
    weight_kg: f64,
    neck_cm: Option<f64>,
    belly_cm: Option<f64>,
    height_cm: Option<f64>,
    sex: Option<&str>,
    hip_cm: Option<f64>,
) -> Option<f64> {
    if weight_kg <= 0.0 {
        return None;
    }
    let neck = neck_cm.filter(|v| *v > 0.0)?;
    let belly = belly_cm.filter(|v| *v > 0.0)?;
    let height = height_cm
        .filter(|v| *v > 0.0)
        .unwrap_or(DEFAULT_HEIGHT_CM);
    let sex = sex.filter(|s| !s.is_empty()).unwrap_or(DEFAULT_SEX);

    let neck_in = neck / CM_PER_INCH;
    let belly_in = belly / CM_PER_INCH;
    let height_in = height / CM_PER_INCH;

    let fat = if sex == "male" {
        let girth = belly_in - neck_in;
        if girth <= 0.0 {
            return None;
        }
        86.010 * girth.log10() - 70.041 * height_in.log10() + 36.76
    } else if let Some(hip) = hip_cm.filter(|v| *v > 0.0) {
        let girth = belly_in + hip / CM_PER_INCH - neck_in;
        if girth <= 0.0 {
            return None;
        }
        163.205 * girth.log10() - 97.684 * height_in.log10() - 104.912
    } else {
        let girth = belly_in - neck_in;
        if girth <= 0.0 {
            return None;
        }
        163.205 * girth.log10() - 97.684 * height_in.log10() - 78.387
    };

    if !fat.is_finite() {
        return None;
    }
    Some(fat.clamp(3.0, 50.0))
}

/// Estimate muscle mass in kg from weight and a body-fat percentage.
///
/// `muscle = weight - fat mass - essential mass`, floored at 0.
#[must_use]
pub fn estimate_muscle_mass(weight_kg: f64, fat_percentage: Option<f64>) -> Option<f64> {
    let fat = fat_percentage.filter(|v| *v > 0.0)?;
    if weight_kg <= 0.0 {
        return None;
    }
    let fat_mass = weight_kg * fat / 100.0;
    let essential_mass = weight_kg * ESSENTIAL_MASS_FRACTION;
    Some((weight_kg - fat_mass - essential_mass).max(0.0))
}

/// Invert the fat-percentage formula: the belly circumference that would
/// produce `fat_percentage`, holding neck/height/hip fixed.
///
/// Used to present "you'd need a waist of X cm" next to a goal's target fat
/// percentage. Returns `None` when neck or the fat percentage is missing or
/// the computation leaves the representable range.
#[must_use]
pub fn infer_belly_circumference(
    fat_percentage: Option<f64>,
    neck_cm: Option<f64>,
    height_cm: Option<f64>,
    sex: Option<&str>,
    hip_cm: Option<f64>,
) -> Option<BellyEstimate> {
    let fat = fat_percentage.filter(|v| *v > 0.0)?;
    let neck = neck_cm.filter(|v| *v > 0.0)?;
    let height = height_cm
        .filter(|v| *v > 0.0)
        .unwrap_or(DEFAULT_HEIGHT_CM);
    let sex = sex.filter(|s| !s.is_empty()).unwrap_or(DEFAULT_SEX);

    let neck_in = neck / CM_PER_INCH;
    let height_in = height / CM_PER_INCH;
    let log_height = height_in.log10();

    let hip_in = hip_cm.filter(|v| *v > 0.0).map(|h| h / CM_PER_INCH);

    // Solve each branch of the forward formula for its log10 girth term, then
    // recover belly from the girth.
    let belly_in = if sex == "male" {
        let girth = 10f64.powf((fat - 36.76 + 70.041 * log_height) / 86.010);
        girth + neck_in
    } else if let Some(hip_in) = hip_in {
        let girth = 10f64.powf((fat + 104.912 + 97.684 * log_height) / 163.205);
        girth + neck_in - hip_in
    } else {
        let girth = 10f64.powf((fat + 78.387 + 97.684 * log_height) / 163.205);
        girth + neck_in
    };

    let belly_cm = belly_in * CM_PER_INCH;
    if !belly_cm.is_finite() {
        return None;
    }

    Some(BellyEstimate {
        belly_cm,
        plausible: belly_cm >= neck && belly_cm <= 200.0,
    })
}
