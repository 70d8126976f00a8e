//! Filter graphs for the two transcode stages.
//!
//! Stage 1 normalizes any upload to a fixed portrait frame; stage 2 lays the
//! mask clip over it and mixes both audio tracks. Labels are fixed so callers
//! can map the outputs without parsing the graph.

/// Video output label of the composite graph.
pub const VIDEO_OUT_LABEL: &str = "[vout]";
/// Audio output label of the composite graph.
pub const AUDIO_OUT_LABEL: &str = "[aout]";

/// Scale until the frame covers `width`x`height` keeping proportions, then
/// center-crop to exactly `width`x`height`.
///
/// Landscape and square inputs are scaled by height, portrait inputs by width.
pub fn preprocess_filter(width: u32, height: u32) -> String {
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h}:(iw-{w})/2:(ih-{h})/2",
        w = width,
        h = height
    )
}

/// Overlay input 1 (mask) on input 0 and mix their audio.
///
/// Input 0's audio is attenuated by `gain` and summed with the mask audio
/// without amix's default 1/N normalization.
pub fn composite_filter(gain: f32) -> String {
    format!(
        "[0:v][1:v]overlay=0:0:shortest=1{vout};\
         [0:a]volume={gain:.2}[base];\
         [base][1:a]amix=inputs=2:duration=longest:normalize=0{aout}",
        vout = VIDEO_OUT_LABEL,
        aout = AUDIO_OUT_LABEL,
        gain = gain
    )
}
