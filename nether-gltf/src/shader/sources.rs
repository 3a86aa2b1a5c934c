//! Built-in GLSL sources, keyed by the identifier passed to the shader cache

pub const BUILTIN_SOURCES: &[(&str, &str)] = &[
    ("primitive.vert", include_str!("../shaders/primitive.vert")),
    ("pbr.frag", include_str!("../shaders/pbr.frag")),
    ("cubemap.vert", include_str!("../shaders/cubemap.vert")),
    ("cubemap.frag", include_str!("../shaders/cubemap.frag")),
    ("fullscreen.vert", include_str!("../shaders/fullscreen.vert")),
    ("panorama_to_cubemap.frag", include_str!("../shaders/panorama_to_cubemap.frag")),
    ("ibl_filtering.frag", include_str!("../shaders/ibl_filtering.frag")),
    ("animation.glsl", include_str!("../shaders/animation.glsl")),
    ("brdf.glsl", include_str!("../shaders/brdf.glsl")),
    ("functions.glsl", include_str!("../shaders/functions.glsl")),
    ("ibl.glsl", include_str!("../shaders/ibl.glsl")),
    ("punctual.glsl", include_str!("../shaders/punctual.glsl")),
    ("textures.glsl", include_str!("../shaders/textures.glsl")),
    ("tonemapping.glsl", include_str!("../shaders/tonemapping.glsl")),
];
