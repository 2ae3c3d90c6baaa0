//! USB model-name composition
//!
//! USB bridges frequently report generic product names, so the vendor name
//! is prefixed to the model number. When the combination does not fit,
//! characters are dropped from the end of the vendor name so the full model
//! number survives.

/// Compose `vendor + model` into at most `capacity` bytes.
///
/// Inputs are descriptor fields and therefore ASCII. If the model alone is
/// longer than `capacity` the vendor is dropped entirely and the model is
/// cut at the capacity.
pub fn compose_usb_model(vendor: &str, model: &str, capacity: usize) -> String {
    let vendor = vendor.as_bytes();
    let model = model.as_bytes();

    let combined = vendor.len() + model.len();
    let mut vendor_len = vendor.len();
    let mut model_len = model.len();

    if combined > capacity {
        let excess = combined - capacity;
        if excess > vendor_len {
            tracing::warn!(
                vendor_len,
                model_len,
                capacity,
                "Model number longer than field; dropping vendor prefix"
            );
            vendor_len = 0;
            model_len = model_len.min(capacity);
        } else {
            vendor_len -= excess;
        }
    }

    let mut composed = Vec::with_capacity(vendor_len + model_len);
    composed.extend_from_slice(&vendor[..vendor_len]);
    composed.extend_from_slice(&model[..model_len]);
    String::from_utf8_lossy(&composed).into_owned()
}
