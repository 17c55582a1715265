// src/web.rs

//! Browser front end: draws the text screen on a `<canvas>` with WebGL.
//!
//! The text buffer and the character ROM are uploaded as single-channel
//! textures and the fragment shader in `crate::shader` does the per-pixel
//! decode. The ROM is fetched asynchronously; until it arrives the ROM
//! texture holds a blank ROM, so frames show background only.

use crate::config::Config;
use crate::cursor::BlinkingCursor;
use crate::glyph::CharacterRom;
use crate::screen::TextBuffer;
use crate::shader::{
    ATTR_CHARACTER_ROM_COORD, ATTR_VERTEX_POSITION, CHAR_TEXTURE_UNIT, FRAGMENT_SHADER,
    QUAD_CHARACTER_COORDS, QUAD_POSITIONS, ROM_TEXTURE_SIZE, TEXT_TEXTURE_SIZE,
    TEXT_TEXTURE_UNIT, UNIFORM_BACKGROUND, UNIFORM_CHAR_SAMPLER, UNIFORM_FOREGROUND,
    UNIFORM_TEXT_SAMPLER, VERTEX_SHADER,
};

use log::{debug, error, info};
use once_cell::unsync::OnceCell;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    HtmlCanvasElement, Response, WebGlBuffer, WebGlProgram, WebGlRenderingContext, WebGlShader,
    WebGlTexture, WebGlUniformLocation, Window,
};

type Gl = WebGlRenderingContext;

/// Id of the canvas element the screen is drawn on.
pub const CANVAS_ID: &str = "c64-screen";

// Required to be 0 for WebGL 1 textures.
const GL_TEXTURE_BORDER_WIDTH: i32 = 0;
const GL_TEXTURE_DETAIL_LEVEL: i32 = 0;

#[derive(Debug)]
pub enum WebError {
    Missing(&'static str),
    Compile(String),
    Link(String),
    Resource(&'static str),
    Rom(String),
    Js(String),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::Missing(what) => write!(f, "{} is unavailable", what),
            WebError::Compile(log) => write!(f, "Shader compilation failed: {}", log),
            WebError::Link(log) => write!(f, "Shader program link failed: {}", log),
            WebError::Resource(what) => write!(f, "Failed to create {}", what),
            WebError::Rom(reason) => write!(f, "Failed to load character ROM: {}", reason),
            WebError::Js(msg) => write!(f, "JavaScript error: {}", msg),
        }
    }
}

impl std::error::Error for WebError {}

impl From<JsValue> for WebError {
    fn from(value: JsValue) -> Self {
        WebError::Js(value.as_string().unwrap_or_else(|| format!("{:?}", value)))
    }
}

impl From<WebError> for JsValue {
    fn from(e: WebError) -> Self {
        JsValue::from_str(&e.to_string())
    }
}

/// Linked program plus the locations looked up once after linking.
struct GlProgram {
    program: WebGlProgram,
    foreground: WebGlUniformLocation,
    background: WebGlUniformLocation,
    char_sampler: WebGlUniformLocation,
    text_sampler: WebGlUniformLocation,
    vertex_position: u32,
    character_rom_coord: u32,
}

struct QuadBuffers {
    positions: WebGlBuffer,
    character_coords: WebGlBuffer,
}

/// Owns all GL state. Every resource is created on first use.
pub struct WebRenderContext {
    gl: Gl,
    canvas: HtmlCanvasElement,
    foreground: [f32; 3],
    background: [f32; 3],
    border: [f32; 3],
    program: OnceCell<GlProgram>,
    quad: OnceCell<QuadBuffers>,
    text_texture: OnceCell<WebGlTexture>,
    rom_texture: OnceCell<WebGlTexture>,
}

impl WebRenderContext {
    pub fn new(canvas: HtmlCanvasElement, config: &Config) -> Result<Self, WebError> {
        let gl = canvas
            .get_context("webgl")?
            .ok_or(WebError::Missing("WebGL context"))?
            .dyn_into::<Gl>()
            .map_err(|_| WebError::Missing("WebGL context"))?;
        Ok(Self {
            gl,
            canvas,
            foreground: config.colors.foreground.normalized(),
            background: config.colors.background.normalized(),
            border: config.colors.border.normalized(),
            program: OnceCell::new(),
            quad: OnceCell::new(),
            text_texture: OnceCell::new(),
            rom_texture: OnceCell::new(),
        })
    }

    /// Compiles and links the program. Safe to call more than once.
    pub fn prepare(&self) -> Result<(), WebError> {
        self.program()?;
        self.quad()?;
        self.rom_texture()?;
        self.text_texture()?;
        Ok(())
    }

    pub fn install_rom(&self, rom: &CharacterRom) -> Result<(), WebError> {
        let texture = self.rom_texture()?.clone();
        self.upload_luminance(&texture, ROM_TEXTURE_SIZE, rom.as_bytes())?;
        info!("WebRenderContext: character ROM installed");
        Ok(())
    }

    pub fn upload_text(&self, text: &TextBuffer) -> Result<(), WebError> {
        let texture = self.text_texture()?;
        self.upload_luminance(texture, TEXT_TEXTURE_SIZE, text.as_bytes())
    }

    pub fn draw(&self) -> Result<(), WebError> {
        let gl = &self.gl;
        let program = self.program()?;
        let quad = self.quad()?;

        gl.viewport(0, 0, self.canvas.width() as i32, self.canvas.height() as i32);
        gl.clear_color(self.border[0], self.border[1], self.border[2], 1.0);
        gl.clear(Gl::COLOR_BUFFER_BIT);

        gl.use_program(Some(&program.program));
        bind_attribute(gl, &quad.positions, program.vertex_position);
        bind_attribute(gl, &quad.character_coords, program.character_rom_coord);

        gl.active_texture(Gl::TEXTURE0 + CHAR_TEXTURE_UNIT);
        gl.bind_texture(Gl::TEXTURE_2D, Some(self.rom_texture()?));
        gl.active_texture(Gl::TEXTURE0 + TEXT_TEXTURE_UNIT);
        gl.bind_texture(Gl::TEXTURE_2D, Some(self.text_texture()?));

        gl.uniform1i(Some(&program.char_sampler), CHAR_TEXTURE_UNIT as i32);
        gl.uniform1i(Some(&program.text_sampler), TEXT_TEXTURE_UNIT as i32);
        gl.uniform3fv_with_f32_array(Some(&program.foreground), &self.foreground);
        gl.uniform3fv_with_f32_array(Some(&program.background), &self.background);

        gl.draw_arrays(Gl::TRIANGLE_STRIP, 0, 4);
        Ok(())
    }

    fn program(&self) -> Result<&GlProgram, WebError> {
        self.program.get_or_try_init(|| {
            let gl = &self.gl;
            let vertex = compile_shader(gl, Gl::VERTEX_SHADER, VERTEX_SHADER)?;
            let fragment = compile_shader(gl, Gl::FRAGMENT_SHADER, FRAGMENT_SHADER)?;
            let program = gl
                .create_program()
                .ok_or(WebError::Resource("shader program"))?;
            gl.attach_shader(&program, &vertex);
            gl.attach_shader(&program, &fragment);
            gl.link_program(&program);
            if !gl
                .get_program_parameter(&program, Gl::LINK_STATUS)
                .as_bool()
                .unwrap_or(false)
            {
                return Err(WebError::Link(
                    gl.get_program_info_log(&program).unwrap_or_default(),
                ));
            }

            let uniform = |name: &'static str| {
                gl.get_uniform_location(&program, name)
                    .ok_or(WebError::Missing(name))
            };
            let attribute = |name: &'static str| {
                let location = gl.get_attrib_location(&program, name);
                u32::try_from(location).map_err(|_| WebError::Missing(name))
            };
            debug!("WebRenderContext: shader program linked");
            Ok(GlProgram {
                foreground: uniform(UNIFORM_FOREGROUND)?,
                background: uniform(UNIFORM_BACKGROUND)?,
                char_sampler: uniform(UNIFORM_CHAR_SAMPLER)?,
                text_sampler: uniform(UNIFORM_TEXT_SAMPLER)?,
                vertex_position: attribute(ATTR_VERTEX_POSITION)?,
                character_rom_coord: attribute(ATTR_CHARACTER_ROM_COORD)?,
                program,
            })
        })
    }

    fn quad(&self) -> Result<&QuadBuffers, WebError> {
        self.quad.get_or_try_init(|| {
            Ok(QuadBuffers {
                positions: create_buffer(&self.gl, &QUAD_POSITIONS)?,
                character_coords: create_buffer(&self.gl, &QUAD_CHARACTER_COORDS)?,
            })
        })
    }

    fn text_texture(&self) -> Result<&WebGlTexture, WebError> {
        self.text_texture.get_or_try_init(|| {
            let texture = create_texture(&self.gl)?;
            self.upload_luminance(&texture, TEXT_TEXTURE_SIZE, TextBuffer::new().as_bytes())?;
            Ok(texture)
        })
    }

    fn rom_texture(&self) -> Result<&WebGlTexture, WebError> {
        self.rom_texture.get_or_try_init(|| {
            let texture = create_texture(&self.gl)?;
            self.upload_luminance(&texture, ROM_TEXTURE_SIZE, CharacterRom::blank().as_bytes())?;
            Ok(texture)
        })
    }

    fn upload_luminance(
        &self,
        texture: &WebGlTexture,
        (width, height): (usize, usize),
        data: &[u8],
    ) -> Result<(), WebError> {
        let gl = &self.gl;
        gl.bind_texture(Gl::TEXTURE_2D, Some(texture));
        gl.pixel_storei(Gl::UNPACK_ALIGNMENT, 1);
        gl.tex_image_2d_with_i32_and_i32_and_i32_and_format_and_type_and_opt_u8_array(
            Gl::TEXTURE_2D,
            GL_TEXTURE_DETAIL_LEVEL,
            Gl::LUMINANCE as i32,
            width as i32,
            height as i32,
            GL_TEXTURE_BORDER_WIDTH,
            Gl::LUMINANCE,
            Gl::UNSIGNED_BYTE,
            Some(data),
        )?;
        gl.tex_parameteri(Gl::TEXTURE_2D, Gl::TEXTURE_WRAP_S, Gl::CLAMP_TO_EDGE as i32);
        gl.tex_parameteri(Gl::TEXTURE_2D, Gl::TEXTURE_WRAP_T, Gl::CLAMP_TO_EDGE as i32);
        gl.tex_parameteri(Gl::TEXTURE_2D, Gl::TEXTURE_MIN_FILTER, Gl::NEAREST as i32);
        gl.tex_parameteri(Gl::TEXTURE_2D, Gl::TEXTURE_MAG_FILTER, Gl::NEAREST as i32);
        Ok(())
    }
}

fn compile_shader(gl: &Gl, kind: u32, source: &str) -> Result<WebGlShader, WebError> {
    let shader = gl.create_shader(kind).ok_or(WebError::Resource("shader"))?;
    gl.shader_source(&shader, source);
    gl.compile_shader(&shader);
    if gl
        .get_shader_parameter(&shader, Gl::COMPILE_STATUS)
        .as_bool()
        .unwrap_or(false)
    {
        Ok(shader)
    } else {
        Err(WebError::Compile(
            gl.get_shader_info_log(&shader).unwrap_or_default(),
        ))
    }
}

fn create_buffer(gl: &Gl, data: &[f32]) -> Result<WebGlBuffer, WebError> {
    let buffer = gl.create_buffer().ok_or(WebError::Resource("vertex buffer"))?;
    gl.bind_buffer(Gl::ARRAY_BUFFER, Some(&buffer));
    let array = js_sys::Float32Array::from(data);
    gl.buffer_data_with_array_buffer_view(Gl::ARRAY_BUFFER, &array, Gl::STATIC_DRAW);
    Ok(buffer)
}

fn create_texture(gl: &Gl) -> Result<WebGlTexture, WebError> {
    gl.create_texture().ok_or(WebError::Resource("texture"))
}

fn bind_attribute(gl: &Gl, buffer: &WebGlBuffer, location: u32) {
    gl.bind_buffer(Gl::ARRAY_BUFFER, Some(buffer));
    gl.vertex_attrib_pointer_with_i32(location, 2, Gl::FLOAT, false, 0, 0);
    gl.enable_vertex_attrib_array(location);
}

fn get_window() -> Result<Window, WebError> {
    web_sys::window().ok_or(WebError::Missing("window"))
}

fn get_canvas(id: &str) -> Result<HtmlCanvasElement, WebError> {
    get_window()?
        .document()
        .ok_or(WebError::Missing("document"))?
        .get_element_by_id(id)
        .ok_or(WebError::Missing("canvas element"))?
        .dyn_into::<HtmlCanvasElement>()
        .map_err(|_| WebError::Missing("canvas element"))
}

/// Shows a fatal error to the user.
fn alert(e: &WebError) {
    error!("{}", e);
    if let Ok(window) = get_window() {
        let _ = window.alert_with_message(&e.to_string());
    }
}

async fn fetch_rom(url: &str) -> Result<CharacterRom, WebError> {
    let window = get_window()?;
    let response: Response = JsFuture::from(window.fetch_with_str(url))
        .await?
        .dyn_into()
        .map_err(|_| WebError::Rom("fetch did not return a Response".to_string()))?;
    if !response.ok() {
        return Err(WebError::Rom(format!(
            "{} answered HTTP {}",
            url,
            response.status()
        )));
    }
    let buffer = JsFuture::from(response.array_buffer()?).await?;
    let bytes = js_sys::Uint8Array::new(&buffer).to_vec();
    CharacterRom::from_bytes(&bytes).map_err(|e| WebError::Rom(e.to_string()))
}

/// Frame loop state shared by the fetch task and the animation callback.
struct WebScreen {
    context: WebRenderContext,
    text: TextBuffer,
    cursor: BlinkingCursor,
    /// Set when the ROM could not be fetched; the loop stops drawing.
    rom_failed: bool,
}

impl WebScreen {
    fn animation_frame(&mut self) -> Result<(), WebError> {
        if let Err(e) = self.cursor.tick(&mut self.text) {
            error!("Cursor update failed: {}", e);
        }
        if self.text.take_dirty() {
            self.context.upload_text(&self.text)?;
        }
        self.context.draw()
    }
}

fn request_animation_frame(f: &Closure<dyn FnMut()>) -> Result<(), WebError> {
    get_window()?.request_animation_frame(f.as_ref().unchecked_ref())?;
    Ok(())
}

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    // A second init (hot reload) keeps the first logger.
    let _ = console_log::init_with_level(log::Level::Info);

    let config = Config::default();
    let screen = match boot(&config) {
        Ok(screen) => Rc::new(RefCell::new(screen)),
        Err(e) => {
            alert(&e);
            return Err(e.into());
        }
    };

    let rom_url = config.rom.path.to_string_lossy().into_owned();
    let fetch_target = screen.clone();
    wasm_bindgen_futures::spawn_local(async move {
        info!("Fetching character ROM from {}", rom_url);
        let result = fetch_rom(&rom_url).await;
        let mut screen = fetch_target.borrow_mut();
        if let Err(e) = result.and_then(|rom| screen.context.install_rom(&rom)) {
            screen.rom_failed = true;
            alert(&e);
        }
    });

    let f: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
    let g = f.clone();
    *g.borrow_mut() = Some(Closure::wrap(Box::new(move || {
        let mut screen = screen.borrow_mut();
        if screen.rom_failed {
            error!("Frame loop stopped: character ROM unavailable");
            return;
        }
        if let Err(e) = screen.animation_frame() {
            alert(&e);
            return;
        }
        if let Some(callback) = f.borrow().as_ref() {
            if let Err(e) = request_animation_frame(callback) {
                error!("{}", e);
            }
        }
    }) as Box<dyn FnMut()>));

    if let Some(callback) = g.borrow().as_ref() {
        request_animation_frame(callback)?;
    }
    Ok(())
}

fn boot(config: &Config) -> Result<WebScreen, WebError> {
    let canvas = get_canvas(CANVAS_ID)?;
    let context = WebRenderContext::new(canvas, config)?;
    context.prepare()?;

    let mut text = TextBuffer::new();
    text.write_welcome_message();
    context.upload_text(&text)?;
    text.take_dirty();

    info!("C64 screen ready on #{}", CANVAS_ID);
    Ok(WebScreen {
        context,
        text,
        cursor: BlinkingCursor::from_config(&config.cursor, &config.performance),
        rom_failed: false,
    })
}
