use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};
use std::time::Duration;

use crate::{
    audio::{
        DisconnectReason, EnqueueOutcome, PlaybackState, PlayerError, SessionEvent,
        SessionSnapshot,
    },
    sources::SongDescriptor,
};

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Guild Jukebox";

/// Límite de Discord para el valor de un campo de embed
pub const FIELD_LIMIT: usize = 1024;

/// Crea un embed para mostrar la canción actual
pub fn create_now_playing_embed(song: &SongDescriptor, state: PlaybackState) -> CreateEmbed {
    let title = match state {
        PlaybackState::Paused => "⏸️ En Pausa",
        _ => "🎵 Reproduciendo Ahora",
    };

    let mut embed = CreateEmbed::default()
        .title(title)
        .description(format!("**{}**", song.title()))
        .color(colors::SUCCESS_GREEN)
        .field("⏱️ Duración", duration_label(song.duration()), true)
        .field("👤 Solicitado por", format!("<@{}>", song.requested_by()), true);

    if let Some(thumbnail) = song.thumbnail() {
        embed = embed.thumbnail(thumbnail);
    }
    if let Some(url) = song.url() {
        embed = embed.url(url);
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed para mostrar lo que se agregó a la cola
pub fn create_enqueued_embed(outcome: &EnqueueOutcome) -> CreateEmbed {
    let title = outcome.first_title.as_deref().unwrap_or("?");
    let description = if outcome.added == 1 {
        format!("**{}** se ha agregado a la cola de reproducción", title)
    } else {
        format!(
            "Se agregaron **{} canciones** a la cola, empezando por **{}**",
            outcome.added, title
        )
    };

    let mut embed = CreateEmbed::default()
        .title("✅ Agregado a la Cola")
        .description(description)
        .color(colors::SUCCESS_GREEN);

    if !outcome.rejected.is_empty() {
        embed = embed
            .field(
                "🚫 Cola llena",
                format!("{} canción(es) no cupieron", outcome.rejected.len()),
                false,
            )
            .color(colors::WARNING_ORANGE);
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed para mostrar la cola de reproducción
pub fn create_queue_embed(snapshot: &SessionSnapshot) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("📋 Cola de Reproducción")
        .color(colors::INFO_BLUE);

    if snapshot.now_playing.is_none() && snapshot.pending.is_empty() {
        return embed
            .description("😴 **La cola está vacía**\n\n💡 Usa `/play <canción>` para agregar música")
            .color(colors::NEUTRAL_GRAY)
            .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
            .timestamp(Timestamp::now());
    }

    if let Some(current) = &snapshot.now_playing {
        let status = match snapshot.state {
            PlaybackState::Paused => "⏸️",
            _ => "▶️",
        };
        embed = embed.field(
            format!("{} Reproduciendo", status),
            truncate_field(&format!("**{}**", current.title())),
            false,
        );
    }

    if !snapshot.pending.is_empty() {
        embed = embed.field("Próximas canciones", queue_lines(&snapshot.pending), false);
    }

    let total: Duration = snapshot.pending.iter().filter_map(SongDescriptor::duration).sum();
    let mut info = format!(
        "**Total:** {}/{} canciones",
        snapshot.pending.len(),
        snapshot.capacity
    );
    if total > Duration::ZERO {
        info.push_str(&format!(" • **Duración:** {}", format_duration(total)));
    }

    embed
        .field("Información", info, false)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
        .timestamp(Timestamp::now())
}

/// Crea un embed de error
pub fn create_error_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("❌ {}", title))
        .description(description)
        .color(colors::ERROR_RED)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed para un evento asíncrono de la sesión
pub fn create_event_embed(event: &SessionEvent) -> CreateEmbed {
    match event {
        SessionEvent::NowPlaying { song } => create_now_playing_embed(song, PlaybackState::Playing),
        SessionEvent::ResolutionFailed { .. } | SessionEvent::PlaybackFailed { .. } => {
            create_error_embed("Canción omitida", &event_text(event))
        }
        SessionEvent::QueueFinished | SessionEvent::Disconnected { .. } => CreateEmbed::default()
            .description(event_text(event))
            .color(colors::NEUTRAL_GRAY)
            .timestamp(Timestamp::now())
            .footer(CreateEmbedFooter::new(STANDARD_FOOTER)),
    }
}

/// Texto plano para un evento de la sesión
pub fn event_text(event: &SessionEvent) -> String {
    match event {
        SessionEvent::NowPlaying { song } => format!("🎵 Reproduciendo: **{}**", song.title()),
        SessionEvent::ResolutionFailed { title, reason, .. } => {
            format!("⏭️ No se pudo cargar **{}**: {}", title, reason)
        }
        SessionEvent::PlaybackFailed { title, reason } => {
            format!("⚠️ Error al reproducir **{}**: {}", title, reason)
        }
        SessionEvent::QueueFinished => "📭 La cola terminó".to_string(),
        SessionEvent::Disconnected {
            reason: DisconnectReason::Idle,
        } => "💤 Desconectado por inactividad".to_string(),
        SessionEvent::Disconnected {
            reason: DisconnectReason::ConnectionLost,
        } => "🔌 Se perdió la conexión de voz".to_string(),
    }
}

/// Mensaje para el usuario ante un error síncrono
pub fn error_text(error: &PlayerError) -> String {
    match error {
        PlayerError::NothingPlaying => "❌ No hay nada reproduciéndose".to_string(),
        PlayerError::NotConnected => "❌ No estoy en un canal de voz".to_string(),
        PlayerError::InvalidState => "❌ Esa acción no aplica ahora mismo".to_string(),
        PlayerError::IndexOutOfRange { len: 0, .. } => "❌ La cola está vacía".to_string(),
        PlayerError::IndexOutOfRange { len, .. } => {
            format!("❌ Posición inválida, usa un número entre 1 y {}", len)
        }
        PlayerError::QueueFull { capacity, .. } => {
            format!("🚫 La cola está llena (máximo {} canciones)", capacity)
        }
        other => format!("❌ {}", other),
    }
}

/// Numbered pending list, cut to fit a single embed field.
pub fn queue_lines(pending: &[SongDescriptor]) -> String {
    let mut out = String::new();
    for (i, song) in pending.iter().enumerate() {
        let line = format!(
            "**{}**. {} `[{}]`\n",
            i + 1,
            song.title(),
            duration_label(song.duration())
        );
        let more = format!("… y {} más", pending.len() - i);
        if out.chars().count() + line.chars().count() + more.chars().count() > FIELD_LIMIT {
            out.push_str(&more);
            return out;
        }
        out.push_str(&line);
    }
    out
}

/// Corta un texto al límite de un campo de embed
pub fn truncate_field(text: &str) -> String {
    if text.chars().count() <= FIELD_LIMIT {
        return text.to_string();
    }
    let mut out: String = text.chars().take(FIELD_LIMIT - 1).collect();
    out.push('…');
    out
}

fn duration_label(duration: Option<Duration>) -> String {
    match duration {
        Some(d) => format_duration(d),
        None => "🔴 En vivo".to_string(),
    }
}

/// Formatea una duración como `HH:MM:SS` o `MM:SS`
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}
